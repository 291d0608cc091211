// SPDX-FileCopyrightText: Jakob Naucke <jnaucke@redhat.com>
//
// SPDX-License-Identifier: MIT

// Provisioning of Ceph CSI storage (pool or filesystem, secret, storage
// class, claim) against a cluster running Rook, and its teardown.
//
// Shared by the `ceph-provision` binary, `manifest-gen` and the tests.

use kube::api::ObjectMeta;

pub mod ceph;
pub mod config;
pub mod error;
pub mod fixture;
pub mod manifests;
pub mod poller;
pub mod provision;
pub mod resource;

pub use ceph::{AdminKey, CephTools, CommandExecutor, ExecOutput, PodExecutor};
pub use config::{Interface, ProvisionConfig, StorageProfile};
pub use error::{Error, Result, TeardownFailure};
pub use fixture::{CreatedResource, FixtureState, StorageFixture};

pub fn name_or_default(meta: &ObjectMeta) -> String {
    meta.name.clone().unwrap_or("<no name>".to_string())
}
