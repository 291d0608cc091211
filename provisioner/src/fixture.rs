// SPDX-FileCopyrightText: Alice Frosi <afrosi@redhat.com>
// SPDX-FileCopyrightText: Jakob Naucke <jnaucke@redhat.com>
//
// SPDX-License-Identifier: MIT

//! Setup and teardown of the storage stack around a test.
//!
//! A [`StorageFixture`] owns everything it creates. Each resource is
//! recorded as soon as its create call returns, so a setup that fails
//! half way can still be torn down. Teardown releases resources in
//! reverse creation order and keeps going past failed deletes.

use k8s_openapi::api::core::v1::PersistentVolumeClaim;
use kube::Client;
use log::{error, info};
use std::fmt;

use crate::ceph::{AdminKey, CephTools, CommandExecutor, monitor_endpoints};
use crate::config::{Interface, ProvisionConfig, StorageProfile};
use crate::error::TeardownFailure;
use crate::manifests::StorageClassParams;
use crate::poller::Poller;
use crate::provision::{self, PHASE_BOUND};
use crate::resource::ResourceClient;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixtureState {
    NotSetUp,
    SetUp,
    /// Setup stopped at a failing step; only teardown is possible.
    SetupFailed,
    TornDown,
}

impl fmt::Display for FixtureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self {
            FixtureState::NotSetUp => "not set up",
            FixtureState::SetUp => "set up",
            FixtureState::SetupFailed => "partially set up",
            FixtureState::TornDown => "torn down",
        };
        f.write_str(state)
    }
}

/// What the fixture needs to delete again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreatedResource {
    BlockPool { name: String, namespace: String },
    Filesystem { name: String, namespace: String },
    Secret { name: String, namespace: String },
    StorageClass { name: String },
    Pvc { name: String, namespace: String },
}

impl fmt::Display for CreatedResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CreatedResource::BlockPool { name, namespace } => {
                write!(f, "CephBlockPool {namespace}/{name}")
            }
            CreatedResource::Filesystem { name, namespace } => {
                write!(f, "CephFilesystem {namespace}/{name}")
            }
            CreatedResource::Secret { name, namespace } => write!(f, "Secret {namespace}/{name}"),
            CreatedResource::StorageClass { name } => write!(f, "StorageClass {name}"),
            CreatedResource::Pvc { name, namespace } => {
                write!(f, "PersistentVolumeClaim {namespace}/{name}")
            }
        }
    }
}

impl CreatedResource {
    async fn delete(&self, client: Client) -> Result<bool> {
        match self {
            CreatedResource::BlockPool { name, namespace } => {
                provision::delete_block_pool(client, namespace, name).await
            }
            CreatedResource::Filesystem { name, namespace } => {
                provision::delete_filesystem(client, namespace, name).await
            }
            CreatedResource::Secret { name, namespace } => {
                provision::delete_secret(client, namespace, name).await
            }
            CreatedResource::StorageClass { name } => {
                provision::delete_storage_class(client, name).await
            }
            CreatedResource::Pvc { name, namespace } => {
                provision::delete_pvc(client, namespace, name).await
            }
        }
    }
}

pub struct StorageFixture<E> {
    client: Client,
    config: ProvisionConfig,
    tools: CephTools<E>,
    state: FixtureState,
    created: Vec<CreatedResource>,
    admin_key: Option<AdminKey>,
    monitors: Option<String>,
}

impl<E: CommandExecutor> StorageFixture<E> {
    pub fn new(client: Client, config: ProvisionConfig, executor: E) -> Self {
        let tools = CephTools::new(client.clone(), &config, executor);
        Self {
            client,
            config,
            tools,
            state: FixtureState::NotSetUp,
            created: Vec::new(),
            admin_key: None,
            monitors: None,
        }
    }

    pub fn state(&self) -> FixtureState {
        self.state
    }

    /// Resources in creation order.
    pub fn created(&self) -> &[CreatedResource] {
        &self.created
    }

    pub fn config(&self) -> &ProvisionConfig {
        &self.config
    }

    fn expect_state(&self, expected: FixtureState) -> Result<()> {
        if self.state != expected {
            return Err(Error::InvalidState {
                actual: self.state,
                expected,
            });
        }
        Ok(())
    }

    /// Creates every configured profile: pool or filesystem, secret,
    /// storage class and a bound claim, in that order.
    pub async fn setup(&mut self) -> Result<()> {
        self.expect_state(FixtureState::NotSetUp)?;
        info!("Setting up {} storage profile(s)", self.config.profiles.len());

        let profiles = self.config.profiles.clone();
        for profile in &profiles {
            if let Err(e) = self.provision(profile).await {
                error!(
                    "Setup of {} profile {} failed: {e}",
                    profile.interface, profile.pool_name
                );
                self.state = FixtureState::SetupFailed;
                return Err(e);
            }
        }
        self.state = FixtureState::SetUp;
        Ok(())
    }

    async fn provision(&mut self, profile: &StorageProfile) -> Result<()> {
        let namespace = self.config.cluster_namespace.clone();
        let data_pool = match profile.interface {
            Interface::Rbd => {
                provision::create_block_pool(
                    self.client.clone(),
                    &namespace,
                    &profile.pool_name,
                    profile.replication_size,
                    &profile.failure_domain,
                )
                .await?;
                self.created.push(CreatedResource::BlockPool {
                    name: profile.pool_name.clone(),
                    namespace: namespace.clone(),
                });
                self.wait_for_pool(&profile.pool_name).await?;
                None
            }
            Interface::CephFs => {
                provision::create_filesystem(
                    self.client.clone(),
                    &namespace,
                    &profile.pool_name,
                    profile.replication_size,
                    &profile.failure_domain,
                )
                .await?;
                self.created.push(CreatedResource::Filesystem {
                    name: profile.pool_name.clone(),
                    namespace: namespace.clone(),
                });
                Some(self.wait_for_data_pool(&profile.pool_name).await?)
            }
        };

        let admin_key = self.admin_key().await?;
        let secret_namespace = self.config.secret_namespace.clone();
        provision::create_secret(
            self.client.clone(),
            profile.interface,
            &profile.secret_name,
            &secret_namespace,
            &admin_key,
        )
        .await?;
        self.created.push(CreatedResource::Secret {
            name: profile.secret_name.clone(),
            namespace: secret_namespace.clone(),
        });

        let monitors = self.monitors().await?;
        let params = StorageClassParams {
            interface: profile.interface,
            name: &profile.storage_class_name,
            monitors: &monitors,
            pool_name: &profile.pool_name,
            data_pool: data_pool.as_deref(),
            secret_name: &profile.secret_name,
            secret_namespace: &secret_namespace,
        };
        provision::create_storage_class(self.client.clone(), &params).await?;
        self.created.push(CreatedResource::StorageClass {
            name: profile.storage_class_name.clone(),
        });
        provision::validate_storage_class(self.client.clone(), &profile.storage_class_name).await?;

        let pvc_namespace = self.config.pvc_namespace(profile).to_string();
        provision::submit_pvc(
            self.client.clone(),
            &profile.pvc_name,
            &pvc_namespace,
            &profile.storage_class_name,
            &profile.capacity,
        )
        .await?;
        self.created.push(CreatedResource::Pvc {
            name: profile.pvc_name.clone(),
            namespace: pvc_namespace.clone(),
        });
        provision::wait_for_pvc_bound(
            self.client.clone(),
            &profile.pvc_name,
            &pvc_namespace,
            self.config.bound_timeout(),
            self.config.poll_interval(),
        )
        .await?;
        Ok(())
    }

    /// Rook creates the Ceph pool asynchronously after the object.
    async fn wait_for_pool(&self, pool_name: &str) -> Result<()> {
        let namespace = self.config.cluster_namespace.as_str();
        let tools = &self.tools;
        let client = &self.client;
        self.poller(format!("waiting for pool {pool_name} to be listed by Ceph"))
            .with_timeout(self.config.pool_timeout())
            .poll_async(move || async move {
                match provision::validate_pool_creation(tools, client.clone(), namespace, pool_name)
                    .await
                {
                    Ok(true) => Ok(()),
                    Ok(false) => Err(Error::Validation(format!("pool {pool_name} not listed"))),
                    Err(e) => Err(e),
                }
            })
            .await
    }

    async fn wait_for_data_pool(&self, fs_name: &str) -> Result<String> {
        let tools = &self.tools;
        self.poller(format!("waiting for filesystem {fs_name} to have a data pool"))
            .with_timeout(self.config.pool_timeout())
            .poll_async(move || tools.cephfs_data_pool(fs_name))
            .await
    }

    fn poller(&self, message: String) -> Poller {
        Poller::new()
            .with_interval(self.config.poll_interval())
            .with_error_message(message)
    }

    async fn admin_key(&mut self) -> Result<AdminKey> {
        if let Some(key) = &self.admin_key {
            return Ok(key.clone());
        }
        let key = self.tools.admin_key().await?;
        self.admin_key = Some(key.clone());
        Ok(key)
    }

    async fn monitors(&mut self) -> Result<String> {
        if let Some(monitors) = &self.monitors {
            return Ok(monitors.clone());
        }
        let monitors = monitor_endpoints(
            self.client.clone(),
            &self.config.cluster_namespace,
            &self.config.mon_label,
            self.config.mon_port,
        )
        .await?;
        info!("Ceph monitors: {monitors}");
        self.monitors = Some(monitors.clone());
        Ok(monitors)
    }

    /// The test body: every storage class is visible and every claim is
    /// bound.
    pub async fn verify(&self) -> Result<()> {
        self.expect_state(FixtureState::SetUp)?;
        for profile in &self.config.profiles {
            match profile.interface {
                Interface::Rbd => {
                    let listed = provision::validate_pool_creation(
                        &self.tools,
                        self.client.clone(),
                        &self.config.cluster_namespace,
                        &profile.pool_name,
                    )
                    .await?;
                    if !listed {
                        return Err(Error::Validation(format!(
                            "pool {} is not listed by Ceph",
                            profile.pool_name
                        )));
                    }
                }
                Interface::CephFs => {
                    self.tools.cephfs_data_pool(&profile.pool_name).await?;
                }
            }
            provision::validate_storage_class(self.client.clone(), &profile.storage_class_name)
                .await?;

            let pvcs: ResourceClient<PersistentVolumeClaim> =
                ResourceClient::namespaced(self.client.clone(), self.config.pvc_namespace(profile));
            let pvc = pvcs.get(&profile.pvc_name).await?;
            if !provision::is_bound(&pvc) {
                return Err(Error::Validation(format!(
                    "PVC {} is {}, expected {PHASE_BOUND}",
                    profile.pvc_name,
                    provision::pvc_phase(&pvc).unwrap_or("without phase")
                )));
            }
        }
        info!("All storage profiles verified");
        Ok(())
    }

    /// Treats every configured resource as created by this fixture, so
    /// that a teardown in a separate run can release them.
    pub fn assume_provisioned(&mut self) -> Result<()> {
        self.expect_state(FixtureState::NotSetUp)?;
        let namespace = &self.config.cluster_namespace;
        for profile in &self.config.profiles {
            let backing = match profile.interface {
                Interface::Rbd => CreatedResource::BlockPool {
                    name: profile.pool_name.clone(),
                    namespace: namespace.clone(),
                },
                Interface::CephFs => CreatedResource::Filesystem {
                    name: profile.pool_name.clone(),
                    namespace: namespace.clone(),
                },
            };
            self.created.extend([
                backing,
                CreatedResource::Secret {
                    name: profile.secret_name.clone(),
                    namespace: self.config.secret_namespace.clone(),
                },
                CreatedResource::StorageClass {
                    name: profile.storage_class_name.clone(),
                },
                CreatedResource::Pvc {
                    name: profile.pvc_name.clone(),
                    namespace: self.config.pvc_namespace(profile).to_string(),
                },
            ]);
        }
        self.state = FixtureState::SetUp;
        Ok(())
    }

    /// Deletes everything that was created, newest first. A failed delete
    /// does not stop the others; all failures are returned together.
    pub async fn teardown(&mut self) -> Result<()> {
        if self.state == FixtureState::TornDown {
            return Err(Error::InvalidState {
                actual: self.state,
                expected: FixtureState::SetUp,
            });
        }
        info!("Tearing down {} resource(s)", self.created.len());

        let mut failures = Vec::new();
        while let Some(resource) = self.created.pop() {
            info!("Deleting {resource}");
            if let Err(error) = resource.delete(self.client.clone()).await {
                error!("Failed to delete {resource}: {error}");
                failures.push(TeardownFailure {
                    resource: resource.to_string(),
                    error,
                });
            }
        }
        self.state = FixtureState::TornDown;

        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::Teardown(failures))
        }
    }

    /// Setup, verify and, whatever happened before, teardown. A fixture
    /// that is not fresh is left untouched.
    pub async fn run(&mut self) -> Result<()> {
        let outcome = match self.setup().await {
            Ok(()) => self.verify().await,
            Err(e @ Error::InvalidState { .. }) => return Err(e),
            Err(e) => Err(e),
        };
        let teardown = self.teardown().await;
        match (outcome, teardown) {
            (Err(e), Err(t)) => {
                error!("Teardown after failed run: {t}");
                Err(e)
            }
            (outcome, teardown) => outcome.and(teardown),
        }
    }
}
