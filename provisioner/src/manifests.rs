// SPDX-FileCopyrightText: Alice Frosi <afrosi@redhat.com>
// SPDX-FileCopyrightText: Jakob Naucke <jnaucke@redhat.com>
//
// SPDX-License-Identifier: MIT

//! In-memory builders for every object the provisioner submits.

use crds::{
    CephBlockPool, CephBlockPoolSpec, CephFilesystem, CephFilesystemSpec, MetadataServerSpec,
    PoolSpec, ReplicatedSpec,
};
use k8s_openapi::{
    ByteString,
    api::{
        core::v1::{
            PersistentVolumeClaim, PersistentVolumeClaimSpec, Secret, VolumeResourceRequirements,
        },
        storage::v1::StorageClass,
    },
    apimachinery::pkg::{api::resource::Quantity, apis::meta::v1::ObjectMeta},
};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::Result;
use crate::ceph::AdminKey;
use crate::config::Interface;

pub const ADMIN_ID: &str = "admin";
pub const RBD_USER_ID: &str = "kubernetes";
pub const ACCESS_MODE_RWO: &str = "ReadWriteOnce";
pub const RECLAIM_DELETE: &str = "Delete";

const PROVISIONER_SECRET_NAME: &str = "csi.storage.k8s.io/provisioner-secret-name";
const PROVISIONER_SECRET_NAMESPACE: &str = "csi.storage.k8s.io/provisioner-secret-namespace";
const NODE_PUBLISH_SECRET_NAME: &str = "csi.storage.k8s.io/node-publish-secret-name";
const NODE_PUBLISH_SECRET_NAMESPACE: &str = "csi.storage.k8s.io/node-publish-secret-namespace";

fn meta(name: &str, namespace: Option<&str>) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: namespace.map(str::to_string),
        ..Default::default()
    }
}

pub fn block_pool(
    name: &str,
    namespace: &str,
    replication_size: u32,
    failure_domain: &str,
) -> CephBlockPool {
    let mut pool = CephBlockPool::new(
        name,
        CephBlockPoolSpec {
            pool: replicated_pool(replication_size, failure_domain),
        },
    );
    pool.metadata.namespace = Some(namespace.to_string());
    pool
}

fn replicated_pool(replication_size: u32, failure_domain: &str) -> PoolSpec {
    PoolSpec {
        failure_domain: Some(failure_domain.to_string()),
        replicated: ReplicatedSpec {
            size: replication_size,
        },
    }
}

/// A filesystem with one metadata pool, one data pool and a single
/// active MDS with a standby.
pub fn filesystem(
    name: &str,
    namespace: &str,
    replication_size: u32,
    failure_domain: &str,
) -> CephFilesystem {
    let pool = replicated_pool(replication_size, failure_domain);
    let mut fs = CephFilesystem::new(
        name,
        CephFilesystemSpec {
            metadata_pool: pool.clone(),
            data_pools: vec![pool],
            metadata_server: MetadataServerSpec {
                active_count: 1,
                active_standby: true,
            },
        },
    );
    fs.metadata.namespace = Some(namespace.to_string());
    fs
}

/// The key is stored raw and goes over the wire base64 encoded.
pub fn secret(interface: Interface, name: &str, namespace: &str, key: &AdminKey) -> Secret {
    let data = match interface {
        Interface::Rbd => BTreeMap::from([(
            ADMIN_ID.to_string(),
            ByteString(key.as_bytes().to_vec()),
        )]),
        Interface::CephFs => BTreeMap::from([
            ("adminID".to_string(), ByteString(ADMIN_ID.as_bytes().to_vec())),
            ("adminKey".to_string(), ByteString(key.as_bytes().to_vec())),
        ]),
    };
    Secret {
        metadata: meta(name, Some(namespace)),
        data: Some(data),
        ..Default::default()
    }
}

/// Names that tie a storage class to its backing pool and credentials.
#[derive(Debug, Clone)]
pub struct StorageClassParams<'a> {
    pub interface: Interface,
    pub name: &'a str,
    pub monitors: &'a str,
    /// Block pool for RBD, filesystem for CephFS.
    pub pool_name: &'a str,
    /// Data pool of the filesystem, CephFS only.
    pub data_pool: Option<&'a str>,
    pub secret_name: &'a str,
    pub secret_namespace: &'a str,
}

pub fn storage_class(params: &StorageClassParams) -> StorageClass {
    let mut parameters = BTreeMap::from([
        ("monitors".to_string(), params.monitors.to_string()),
        (
            PROVISIONER_SECRET_NAME.to_string(),
            params.secret_name.to_string(),
        ),
        (
            PROVISIONER_SECRET_NAMESPACE.to_string(),
            params.secret_namespace.to_string(),
        ),
        (
            NODE_PUBLISH_SECRET_NAME.to_string(),
            params.secret_name.to_string(),
        ),
        (
            NODE_PUBLISH_SECRET_NAMESPACE.to_string(),
            params.secret_namespace.to_string(),
        ),
    ]);
    match params.interface {
        Interface::Rbd => {
            parameters.extend([
                ("pool".to_string(), params.pool_name.to_string()),
                ("imageFormat".to_string(), "2".to_string()),
                // CSI RBD only supports layering
                ("imageFeatures".to_string(), "layering".to_string()),
                ("adminid".to_string(), ADMIN_ID.to_string()),
                ("userid".to_string(), RBD_USER_ID.to_string()),
            ]);
        }
        Interface::CephFs => {
            parameters.extend([
                ("fsName".to_string(), params.pool_name.to_string()),
                ("provisionVolume".to_string(), "true".to_string()),
            ]);
            if let Some(data_pool) = params.data_pool {
                parameters.insert("pool".to_string(), data_pool.to_string());
            }
        }
    }

    StorageClass {
        metadata: meta(params.name, None),
        provisioner: params.interface.provisioner().to_string(),
        parameters: Some(parameters),
        reclaim_policy: Some(RECLAIM_DELETE.to_string()),
        ..Default::default()
    }
}

pub fn pvc(name: &str, namespace: &str, storage_class: &str, capacity: &str) -> PersistentVolumeClaim {
    PersistentVolumeClaim {
        metadata: meta(name, Some(namespace)),
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(vec![ACCESS_MODE_RWO.to_string()]),
            resources: Some(VolumeResourceRequirements {
                requests: Some(BTreeMap::from([(
                    "storage".to_string(),
                    Quantity(capacity.to_string()),
                )])),
                ..Default::default()
            }),
            storage_class_name: Some(storage_class.to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Render a single manifest.
pub fn to_yaml<T: Serialize>(resource: &T) -> Result<String> {
    serde_yaml::to_string(resource).map_err(Into::into)
}
