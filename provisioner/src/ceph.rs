// SPDX-FileCopyrightText: Alice Frosi <afrosi@redhat.com>
// SPDX-FileCopyrightText: Jakob Naucke <jnaucke@redhat.com>
//
// SPDX-License-Identifier: MIT

//! Access to the Ceph cluster through the Rook toolbox pod.

use base64::{Engine as _, engine::general_purpose};
use futures_util::future::try_join;
use k8s_openapi::api::core::v1::{Pod, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Status;
use kube::api::{AttachParams, ListParams};
use kube::{Api, Client};
use log::{debug, info};
use serde::Deserialize;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::config::ProvisionConfig;
use crate::{Error, Result, name_or_default};

pub const ADMIN_KEY_COMMAND: &str = "ceph auth get-key client.admin | base64";

/// The `client.admin` key, raw.
#[derive(Clone, PartialEq, Eq)]
pub struct AdminKey(String);

impl AdminKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Decodes the output of `base64`, which may be wrapped over lines.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let compact: String = encoded.split_whitespace().collect();
        let decoded = general_purpose::STANDARD.decode(compact)?;
        let key = String::from_utf8(decoded)
            .map_err(|_| Error::Output("admin key is not valid UTF-8".to_string()))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(Error::Output("admin key is empty".to_string()));
        }
        Ok(Self(key.to_string()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn to_base64(&self) -> String {
        general_purpose::STANDARD.encode(&self.0)
    }
}

impl fmt::Debug for AdminKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AdminKey(<redacted>)")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    pub code: i32,
}

/// Runs a command inside a container of a pod.
pub trait CommandExecutor {
    fn exec(
        &self,
        namespace: &str,
        pod: &str,
        command: Vec<String>,
    ) -> impl Future<Output = Result<ExecOutput>> + Send;
}

/// Executes over the pod `exec` subresource.
#[derive(Clone)]
pub struct PodExecutor {
    client: Client,
}

impl PodExecutor {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

async fn read_all(mut reader: impl AsyncRead + Unpin) -> std::io::Result<String> {
    let mut out = String::new();
    reader.read_to_string(&mut out).await?;
    Ok(out)
}

fn exit_code(status: Option<&Status>) -> i32 {
    let Some(status) = status else {
        return -1;
    };
    if status.status.as_deref() == Some("Success") {
        return 0;
    }
    status
        .details
        .as_ref()
        .and_then(|d| d.causes.as_ref())
        .and_then(|causes| {
            causes
                .iter()
                .find(|c| c.reason.as_deref() == Some("ExitCode"))
                .and_then(|c| c.message.as_deref())
                .and_then(|m| m.parse().ok())
        })
        .unwrap_or(-1)
}

impl CommandExecutor for PodExecutor {
    async fn exec(&self, namespace: &str, pod: &str, command: Vec<String>) -> Result<ExecOutput> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = AttachParams::default().stdout(true).stderr(true);
        let mut attached = pods.exec(pod, command, &params).await?;

        let missing = |stream: &str| Error::Output(format!("no {stream} stream from pod {pod}"));
        let stdout = attached.stdout().ok_or_else(|| missing("stdout"))?;
        let stderr = attached.stderr().ok_or_else(|| missing("stderr"))?;
        let status = attached.take_status().ok_or_else(|| missing("status"))?;

        let (stdout, stderr) = try_join(read_all(stdout), read_all(stderr)).await?;
        let status = status.await;
        Ok(ExecOutput {
            stdout,
            stderr,
            code: exit_code(status.as_ref()),
        })
    }
}

/// An entry of `ceph osd lspools`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PoolEntry {
    pub poolnum: i64,
    pub poolname: String,
}

/// An entry of `ceph fs ls`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FsEntry {
    pub name: String,
    pub metadata_pool: String,
    pub data_pools: Vec<String>,
}

pub struct CephTools<E> {
    client: Client,
    namespace: String,
    tools_label: String,
    timeout: Duration,
    executor: E,
}

impl<E: CommandExecutor> CephTools<E> {
    pub fn new(client: Client, config: &ProvisionConfig, executor: E) -> Self {
        Self {
            client,
            namespace: config.cluster_namespace.clone(),
            tools_label: config.tools_label.clone(),
            timeout: config.exec_timeout(),
            executor,
        }
    }

    /// Name of the toolbox pod, preferring a running one.
    pub async fn tools_pod(&self) -> Result<String> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), &self.namespace);
        let list = pods
            .list(&ListParams::default().labels(&self.tools_label))
            .await?;
        let running = list.items.iter().find(|p| {
            p.status.as_ref().and_then(|s| s.phase.as_deref()) == Some("Running")
        });
        running
            .or(list.items.first())
            .map(|p| name_or_default(&p.metadata))
            .ok_or_else(|| Error::NoToolsPod {
                selector: self.tools_label.clone(),
                namespace: self.namespace.clone(),
            })
    }

    /// Runs `command` in the toolbox. A non-zero exit code is an error.
    pub async fn run(&self, command: &[&str]) -> Result<ExecOutput> {
        let pod = self.tools_pod().await?;
        let printable = command.join(" ");
        debug!("Executing `{printable}` in {}/{pod}", self.namespace);

        let command = command.iter().map(|s| s.to_string()).collect();
        let exec = self.executor.exec(&self.namespace, &pod, command);
        let output = tokio::time::timeout(self.timeout, exec)
            .await
            .map_err(|_| {
                Error::Timeout(format!("after {:?} running `{printable}` in {pod}", self.timeout))
            })??;

        if output.code != 0 {
            return Err(Error::Command {
                command: printable,
                code: output.code,
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output)
    }

    /// Runs a `ceph` command with JSON output and parses it.
    pub async fn exec_ceph_cmd<T: serde::de::DeserializeOwned>(&self, ceph_cmd: &str) -> Result<T> {
        let mut command: Vec<&str> = ceph_cmd.split_whitespace().collect();
        command.extend(["--format", "json"]);
        let output = self.run(&command).await?;
        serde_json::from_str(&output.stdout).map_err(Into::into)
    }

    pub async fn admin_key(&self) -> Result<AdminKey> {
        let output = self.run(&["sh", "-c", ADMIN_KEY_COMMAND]).await?;
        let key = AdminKey::from_base64(&output.stdout)?;
        info!("Fetched client.admin key");
        Ok(key)
    }

    pub async fn list_pools(&self) -> Result<Vec<PoolEntry>> {
        self.exec_ceph_cmd("ceph osd lspools").await
    }

    pub async fn filesystems(&self) -> Result<Vec<FsEntry>> {
        self.exec_ceph_cmd("ceph fs ls").await
    }

    /// First data pool of the filesystem `fs_name`.
    pub async fn cephfs_data_pool(&self, fs_name: &str) -> Result<String> {
        self.filesystems()
            .await?
            .into_iter()
            .find(|fs| fs.name == fs_name)
            .and_then(|fs| fs.data_pools.into_iter().next())
            .ok_or_else(|| Error::Validation(format!("filesystem {fs_name} has no data pool")))
    }
}

/// `ip:port` of every monitor service, comma separated.
pub async fn monitor_endpoints(
    client: Client,
    namespace: &str,
    mon_label: &str,
    port: u16,
) -> Result<String> {
    let services: Api<Service> = Api::namespaced(client, namespace);
    let list = services
        .list(&ListParams::default().labels(mon_label))
        .await?;
    let mut endpoints: Vec<String> = list
        .items
        .iter()
        .filter_map(|svc| svc.spec.as_ref()?.cluster_ip.clone())
        .filter(|ip| !ip.is_empty() && ip != "None")
        .map(|ip| format!("{ip}:{port}"))
        .collect();
    endpoints.sort();
    if endpoints.is_empty() {
        return Err(Error::Validation(format!(
            "no monitor service with label {mon_label} in namespace {namespace}"
        )));
    }
    Ok(endpoints.join(","))
}
