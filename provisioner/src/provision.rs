// SPDX-FileCopyrightText: Alice Frosi <afrosi@redhat.com>
// SPDX-FileCopyrightText: Jakob Naucke <jnaucke@redhat.com>
//
// SPDX-License-Identifier: MIT

//! One create and one delete call per resource kind, plus the checks
//! that the created resources are visible.

use crds::{CephBlockPool, CephFilesystem};
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Secret};
use k8s_openapi::api::storage::v1::StorageClass;
use kube::Client;
use log::{info, warn};
use std::time::Duration;

use crate::Result;
use crate::ceph::{AdminKey, CephTools, CommandExecutor};
use crate::config::Interface;
use crate::manifests::{self, StorageClassParams};
use crate::resource::ResourceClient;

pub const PHASE_BOUND: &str = "Bound";

pub fn pvc_phase(pvc: &PersistentVolumeClaim) -> Option<&str> {
    pvc.status.as_ref()?.phase.as_deref()
}

pub fn is_bound(pvc: &PersistentVolumeClaim) -> bool {
    pvc_phase(pvc) == Some(PHASE_BOUND)
}

pub async fn create_block_pool(
    client: Client,
    namespace: &str,
    pool_name: &str,
    replication_size: u32,
    failure_domain: &str,
) -> Result<CephBlockPool> {
    info!("Creating CephBlockPool {pool_name} with {replication_size} replicas");
    let pool = manifests::block_pool(pool_name, namespace, replication_size, failure_domain);
    ResourceClient::namespaced(client, namespace)
        .create(&pool)
        .await
}

pub async fn create_filesystem(
    client: Client,
    namespace: &str,
    fs_name: &str,
    replication_size: u32,
    failure_domain: &str,
) -> Result<CephFilesystem> {
    info!("Creating CephFilesystem {fs_name}");
    let fs = manifests::filesystem(fs_name, namespace, replication_size, failure_domain);
    ResourceClient::namespaced(client, namespace)
        .create(&fs)
        .await
}

pub async fn create_secret(
    client: Client,
    interface: Interface,
    name: &str,
    namespace: &str,
    admin_key: &AdminKey,
) -> Result<Secret> {
    info!("Creating {interface} Secret {name}");
    let secret = manifests::secret(interface, name, namespace, admin_key);
    ResourceClient::namespaced(client, namespace)
        .create(&secret)
        .await
}

pub async fn create_storage_class(
    client: Client,
    params: &StorageClassParams<'_>,
) -> Result<StorageClass> {
    info!("Creating {} StorageClass {}", params.interface, params.name);
    let sc = manifests::storage_class(params);
    ResourceClient::cluster(client).create(&sc).await
}

/// Submits the claim without waiting for it to bind.
pub async fn submit_pvc(
    client: Client,
    name: &str,
    namespace: &str,
    storage_class: &str,
    capacity: &str,
) -> Result<PersistentVolumeClaim> {
    info!("Creating PVC {name} of {capacity} from {storage_class}");
    let pvc = manifests::pvc(name, namespace, storage_class, capacity);
    ResourceClient::namespaced(client, namespace)
        .create(&pvc)
        .await
}

pub async fn wait_for_pvc_bound(
    client: Client,
    name: &str,
    namespace: &str,
    timeout: Duration,
    interval: Duration,
) -> Result<PersistentVolumeClaim> {
    let pvcs: ResourceClient<PersistentVolumeClaim> = ResourceClient::namespaced(client, namespace);
    let pvc = pvcs
        .wait_for_condition(name, PHASE_BOUND, timeout, interval, is_bound)
        .await?;
    info!("PVC {name} is {PHASE_BOUND}");
    Ok(pvc)
}

/// Creates the claim and returns once it reports `Bound`.
pub async fn create_pvc(
    client: Client,
    name: &str,
    namespace: &str,
    storage_class: &str,
    capacity: &str,
    timeout: Duration,
    interval: Duration,
) -> Result<PersistentVolumeClaim> {
    submit_pvc(client.clone(), name, namespace, storage_class, capacity).await?;
    wait_for_pvc_bound(client, name, namespace, timeout, interval).await
}

/// Checks the pool on both the Ceph side and the Kubernetes side.
///
/// The `CephBlockPool` must be retrievable under `pool_name`, otherwise
/// the lookup error is returned. The result tells whether Ceph lists a
/// pool with that name.
pub async fn validate_pool_creation<E: CommandExecutor>(
    tools: &CephTools<E>,
    client: Client,
    namespace: &str,
    pool_name: &str,
) -> Result<bool> {
    let ceph_side = tools
        .list_pools()
        .await?
        .iter()
        .any(|pool| pool.poolname == pool_name);
    if ceph_side {
        info!("{pool_name} pool is created at the Ceph side");
    } else {
        warn!("{pool_name} pool is not listed at the Ceph side");
    }

    let pools: ResourceClient<CephBlockPool> = ResourceClient::namespaced(client, namespace);
    let pool = pools.get(pool_name).await?;
    if let Some(status) = pool.status.filter(|s| !s.is_ready()) {
        info!("CephBlockPool {pool_name} is in phase {:?}", status.phase);
    }
    Ok(ceph_side)
}

pub async fn validate_storage_class(client: Client, sc_name: &str) -> Result<()> {
    let scs: ResourceClient<StorageClass> = ResourceClient::cluster(client);
    scs.get(sc_name).await?;
    info!("StorageClass {sc_name} exists");
    Ok(())
}

pub async fn delete_block_pool(client: Client, namespace: &str, pool_name: &str) -> Result<bool> {
    ResourceClient::<CephBlockPool>::namespaced(client, namespace)
        .delete(pool_name)
        .await
}

pub async fn delete_filesystem(client: Client, namespace: &str, fs_name: &str) -> Result<bool> {
    ResourceClient::<CephFilesystem>::namespaced(client, namespace)
        .delete(fs_name)
        .await
}

pub async fn delete_secret(client: Client, namespace: &str, name: &str) -> Result<bool> {
    ResourceClient::<Secret>::namespaced(client, namespace)
        .delete(name)
        .await
}

pub async fn delete_storage_class(client: Client, name: &str) -> Result<bool> {
    ResourceClient::<StorageClass>::cluster(client)
        .delete(name)
        .await
}

pub async fn delete_pvc(client: Client, namespace: &str, name: &str) -> Result<bool> {
    ResourceClient::<PersistentVolumeClaim>::namespaced(client, namespace)
        .delete(name)
        .await
}
