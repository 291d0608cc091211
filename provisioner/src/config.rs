// SPDX-FileCopyrightText: Alice Frosi <afrosi@redhat.com>
//
// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};
use std::{fmt, fs, path::Path, time::Duration};

use crate::Result;

pub const ROOK_CLUSTER_NAMESPACE: &str = "openshift-storage";
pub const DEFAULT_SECRET_NAMESPACE: &str = "default";
pub const TOOLS_LABEL: &str = "app=rook-ceph-tools";
pub const MON_LABEL: &str = "app=rook-ceph-mon";
pub const MON_PORT: u16 = 6789;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Interface {
    Rbd,
    CephFs,
}

impl Interface {
    pub fn provisioner(&self) -> &'static str {
        match self {
            Interface::Rbd => "rbd.csi.ceph.com",
            Interface::CephFs => "cephfs.csi.ceph.com",
        }
    }
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interface::Rbd => write!(f, "rbd"),
            Interface::CephFs => write!(f, "cephfs"),
        }
    }
}

/// One pool (or filesystem) with the secret, storage class and claim
/// that are provisioned on top of it.
///
/// Fields left out of a configuration file take the defaults of the
/// profile's interface.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(from = "ProfileEntry", rename_all = "camelCase")]
pub struct StorageProfile {
    pub interface: Interface,
    /// `CephBlockPool` name for RBD, `CephFilesystem` name for CephFS.
    pub pool_name: String,
    pub replication_size: u32,
    pub failure_domain: String,
    pub secret_name: String,
    pub storage_class_name: String,
    pub pvc_name: String,
    /// Falls back to the cluster namespace.
    pub pvc_namespace: Option<String>,
    pub capacity: String,
}

impl Default for StorageProfile {
    fn default() -> Self {
        Self {
            interface: Interface::Rbd,
            pool_name: "my-pool".to_string(),
            replication_size: 3,
            failure_domain: crds::FAILURE_DOMAIN_HOST.to_string(),
            secret_name: "csi-rbd-secret".to_string(),
            storage_class_name: "ocsci-csi-rbd-sc".to_string(),
            pvc_name: "rbd-pvc".to_string(),
            pvc_namespace: None,
            capacity: "1Gi".to_string(),
        }
    }
}

/// A profile as written in a configuration file.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ProfileEntry {
    interface: Option<Interface>,
    pool_name: Option<String>,
    replication_size: Option<u32>,
    failure_domain: Option<String>,
    secret_name: Option<String>,
    storage_class_name: Option<String>,
    pvc_name: Option<String>,
    pvc_namespace: Option<String>,
    capacity: Option<String>,
}

impl From<ProfileEntry> for StorageProfile {
    fn from(entry: ProfileEntry) -> Self {
        let base = match entry.interface.unwrap_or(Interface::Rbd) {
            Interface::Rbd => StorageProfile::default(),
            Interface::CephFs => StorageProfile::cephfs(),
        };
        Self {
            interface: base.interface,
            pool_name: entry.pool_name.unwrap_or(base.pool_name),
            replication_size: entry.replication_size.unwrap_or(base.replication_size),
            failure_domain: entry.failure_domain.unwrap_or(base.failure_domain),
            secret_name: entry.secret_name.unwrap_or(base.secret_name),
            storage_class_name: entry.storage_class_name.unwrap_or(base.storage_class_name),
            pvc_name: entry.pvc_name.unwrap_or(base.pvc_name),
            pvc_namespace: entry.pvc_namespace.or(base.pvc_namespace),
            capacity: entry.capacity.unwrap_or(base.capacity),
        }
    }
}

impl StorageProfile {
    pub fn cephfs() -> Self {
        Self {
            interface: Interface::CephFs,
            pool_name: "ocsci-cephfs".to_string(),
            secret_name: "csi-cephfs-secret".to_string(),
            storage_class_name: "ocsci-csi-cephfs-sc".to_string(),
            pvc_name: "cephfs-pvc".to_string(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProvisionConfig {
    pub cluster_namespace: String,
    pub secret_namespace: String,
    pub tools_label: String,
    pub mon_label: String,
    pub mon_port: u16,
    pub exec_timeout_secs: u64,
    pub bound_timeout_secs: u64,
    pub pool_timeout_secs: u64,
    pub poll_interval_millis: u64,
    pub profiles: Vec<StorageProfile>,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            cluster_namespace: ROOK_CLUSTER_NAMESPACE.to_string(),
            secret_namespace: DEFAULT_SECRET_NAMESPACE.to_string(),
            tools_label: TOOLS_LABEL.to_string(),
            mon_label: MON_LABEL.to_string(),
            mon_port: MON_PORT,
            exec_timeout_secs: 20,
            bound_timeout_secs: 120,
            pool_timeout_secs: 60,
            poll_interval_millis: 2000,
            profiles: vec![StorageProfile::default()],
        }
    }
}

impl ProvisionConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(Into::into)
    }

    pub fn pvc_namespace<'a>(&'a self, profile: &'a StorageProfile) -> &'a str {
        profile
            .pvc_namespace
            .as_deref()
            .unwrap_or(&self.cluster_namespace)
    }

    pub fn exec_timeout(&self) -> Duration {
        Duration::from_secs(self.exec_timeout_secs)
    }

    pub fn bound_timeout(&self) -> Duration {
        Duration::from_secs(self.bound_timeout_secs)
    }

    pub fn pool_timeout(&self) -> Duration {
        Duration::from_secs(self.pool_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_millis)
    }
}
