// SPDX-FileCopyrightText: Alice Frosi <afrosi@redhat.com>
// SPDX-FileCopyrightText: Jakob Naucke <jnaucke@redhat.com>
//
// SPDX-License-Identifier: MIT

//! The subset of the Rook `ceph.rook.io/v1` API that is needed to
//! provision pools and filesystems for the Ceph CSI drivers.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const FAILURE_DOMAIN_HOST: &str = "host";
pub const PHASE_READY: &str = "Ready";

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct ReplicatedSpec {
    pub size: u32,
}

/// Pool settings shared by block pools and the pools backing a filesystem.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PoolSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_domain: Option<String>,
    pub replicated: ReplicatedSpec,
}

#[derive(CustomResource, Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "ceph.rook.io",
    version = "v1",
    kind = "CephBlockPool",
    namespaced,
    plural = "cephblockpools",
    status = "CephStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct CephBlockPoolSpec {
    #[serde(flatten)]
    pub pool: PoolSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MetadataServerSpec {
    pub active_count: u32,
    pub active_standby: bool,
}

#[derive(CustomResource, Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "ceph.rook.io",
    version = "v1",
    kind = "CephFilesystem",
    namespaced,
    plural = "cephfilesystems",
    status = "CephStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct CephFilesystemSpec {
    pub metadata_pool: PoolSpec,
    pub data_pools: Vec<PoolSpec>,
    pub metadata_server: MetadataServerSpec,
}

/// Status reported by Rook on pools and filesystems.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct CephStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
}

impl CephStatus {
    pub fn is_ready(&self) -> bool {
        self.phase.as_deref() == Some(PHASE_READY)
    }
}
