// SPDX-FileCopyrightText: Alice Frosi <afrosi@redhat.com>
// SPDX-FileCopyrightText: Jakob Naucke <jnaucke@redhat.com>
//
// SPDX-License-Identifier: MIT

#![allow(dead_code)]

use base64::{Engine as _, engine::general_purpose};
use http::{Method, Request, Response, StatusCode};
use http_body_util::BodyExt;
use kube::{Client, client::Body, error::ErrorResponse};
use provisioner::ceph::ADMIN_KEY_COMMAND;
use provisioner::{CommandExecutor, ExecOutput, ProvisionConfig};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;
use tower::service_fn;

pub const ADMIN_KEY: &str = "AQCFwudcFcPSGRAAg0Zjf0ePNzRKSYtMR2VIKA==";
pub const TOOLS_POD: &str = "rook-ceph-tools-5f4b8c7d9-x2xkq";

static INIT: Once = Once::new();

pub fn init_logging() {
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

/// Short timeouts so failing waits end quickly.
pub fn test_config() -> ProvisionConfig {
    ProvisionConfig {
        exec_timeout_secs: 5,
        bound_timeout_secs: 1,
        pool_timeout_secs: 1,
        poll_interval_millis: 10,
        ..Default::default()
    }
}

async fn create_response<T: Future<Output = Result<String, StatusCode>>>(
    response: T,
) -> Result<Response<Body>, Infallible> {
    let (body, status_code) = match response.await {
        Ok(response_data) => (Body::from(response_data.into_bytes()), StatusCode::OK),
        Err(status_code) => {
            let unknown_msg = format!("error with status code {status_code}");
            let (message, reason) = match status_code {
                StatusCode::CONFLICT => ("resource already exists", "AlreadyExists"),
                StatusCode::INTERNAL_SERVER_ERROR => ("internal server error", "ServerTimeout"),
                StatusCode::NOT_FOUND => ("resource not found", "NotFound"),
                StatusCode::BAD_REQUEST => ("bad request", "BadRequest"),
                _ => (unknown_msg.as_str(), "Unknown"),
            };
            let error_response = ErrorResponse {
                status: "Failure".to_string(),
                message: message.to_string(),
                reason: reason.to_string(),
                code: status_code.as_u16(),
            };
            let error_json = serde_json::to_string(&error_response).unwrap();
            (Body::from(error_json.into_bytes()), status_code)
        }
    };
    Ok(Response::builder().status(status_code).body(body).unwrap())
}

pub struct MockClient<F, T>
where
    F: Fn(Request<Body>) -> T + Send + Sync + 'static,
    T: Future<Output = Result<String, StatusCode>> + Send + 'static,
{
    response_closure: F,
    namespace: String,
}

impl<F, T> MockClient<F, T>
where
    F: Fn(Request<Body>) -> T + Send + Sync + 'static,
    T: Future<Output = Result<String, StatusCode>> + Send + 'static,
{
    pub fn new(response_closure: F, namespace: String) -> Self {
        Self {
            response_closure,
            namespace,
        }
    }

    pub fn into_client(self) -> Client {
        let namespace = self.namespace.clone();
        let mock_svc = service_fn(move |req: Request<Body>| {
            let response = (self.response_closure)(req);
            create_response(response)
        });
        Client::new(mock_svc, namespace)
    }
}

/// One request as seen by the fake API server.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub method: Method,
    pub path: String,
}

impl Call {
    /// Plural of the kind the request is about.
    pub fn plural(&self) -> &str {
        let segments: Vec<&str> = self.path.trim_end_matches('/').split('/').collect();
        if self.method == Method::POST {
            segments[segments.len() - 1]
        } else {
            segments[segments.len() - 2]
        }
    }

    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or_default()
    }
}

struct Failure {
    method: Method,
    plural: &'static str,
    code: StatusCode,
}

#[derive(Default)]
struct ClusterState {
    objects: BTreeMap<String, Value>,
    calls: Vec<Call>,
    failures: Vec<Failure>,
    leave_pvcs_pending: bool,
}

/// An in-memory API server: objects are stored on POST under their path,
/// served on GET and removed on DELETE. Claims report `Bound` unless
/// told otherwise, and the toolbox pod and two monitor services always
/// exist.
#[derive(Clone, Default)]
pub struct FakeCluster {
    state: Arc<Mutex<ClusterState>>,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers every `method` request on `plural` with `code`.
    pub fn fail(self, method: Method, plural: &'static str, code: StatusCode) -> Self {
        self.state.lock().unwrap().failures.push(Failure {
            method,
            plural,
            code,
        });
        self
    }

    pub fn leave_pvcs_pending(self) -> Self {
        self.state.lock().unwrap().leave_pvcs_pending = true;
        self
    }

    /// Stores an object as if it had been created before.
    pub fn preload(self, collection_path: &str, name: &str, object: Value) -> Self {
        self.state
            .lock()
            .unwrap()
            .objects
            .insert(format!("{collection_path}/{name}"), object);
        self
    }

    pub fn client(&self) -> Client {
        let cluster = self.clone();
        MockClient::new(
            move |req: Request<Body>| {
                let cluster = cluster.clone();
                async move { cluster.handle(req).await }
            },
            "default".to_string(),
        )
        .into_client()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    fn calls_with(&self, method: Method) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.method == method)
            .collect()
    }

    /// Plurals of all POSTs, in order.
    pub fn created(&self) -> Vec<String> {
        self.calls_with(Method::POST)
            .iter()
            .map(|c| c.plural().to_string())
            .collect()
    }

    /// `plural/name` of all DELETEs, in order.
    pub fn deleted(&self) -> Vec<String> {
        self.calls_with(Method::DELETE)
            .iter()
            .map(|c| format!("{}/{}", c.plural(), c.name()))
            .collect()
    }

    pub fn object(&self, path: &str) -> Option<Value> {
        self.state.lock().unwrap().objects.get(path).cloned()
    }

    pub fn object_count(&self) -> usize {
        self.state.lock().unwrap().objects.len()
    }

    async fn handle(&self, req: Request<Body>) -> Result<String, StatusCode> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let body = req
            .into_body()
            .collect()
            .await
            .map_err(|_| StatusCode::BAD_REQUEST)?
            .to_bytes();

        let mut state = self.state.lock().unwrap();
        let call = Call {
            method: method.clone(),
            path: path.clone(),
        };
        state.calls.push(call.clone());

        let failure = state
            .failures
            .iter()
            .find(|f| f.method == method && f.plural == call.plural());
        if let Some(failure) = failure {
            return Err(failure.code);
        }

        match method.as_str() {
            "GET" if path.ends_with("/pods") => Ok(tools_pod_list()),
            "GET" if path.ends_with("/services") => Ok(mon_service_list()),
            "GET" => {
                let mut object = state.objects.get(&path).cloned().ok_or(StatusCode::NOT_FOUND)?;
                if call.plural() == "persistentvolumeclaims" {
                    let phase = if state.leave_pvcs_pending { "Pending" } else { "Bound" };
                    object["status"] = json!({ "phase": phase });
                }
                Ok(object.to_string())
            }
            "POST" => {
                let object: Value =
                    serde_json::from_slice(&body).map_err(|_| StatusCode::BAD_REQUEST)?;
                let name = object["metadata"]["name"]
                    .as_str()
                    .ok_or(StatusCode::BAD_REQUEST)?;
                let key = format!("{path}/{name}");
                if state.objects.contains_key(&key) {
                    return Err(StatusCode::CONFLICT);
                }
                state.objects.insert(key, object.clone());
                Ok(object.to_string())
            }
            "DELETE" => {
                state.objects.remove(&path).ok_or(StatusCode::NOT_FOUND)?;
                Ok(json!({
                    "kind": "Status",
                    "apiVersion": "v1",
                    "metadata": {},
                    "status": "Success"
                })
                .to_string())
            }
            _ => Err(StatusCode::BAD_REQUEST),
        }
    }
}

fn tools_pod_list() -> String {
    json!({
        "apiVersion": "v1",
        "kind": "PodList",
        "metadata": {},
        "items": [{
            "metadata": {"name": TOOLS_POD, "labels": {"app": "rook-ceph-tools"}},
            "status": {"phase": "Running"}
        }]
    })
    .to_string()
}

fn mon_service_list() -> String {
    json!({
        "apiVersion": "v1",
        "kind": "ServiceList",
        "metadata": {},
        "items": [
            {"metadata": {"name": "rook-ceph-mon-b"}, "spec": {"clusterIP": "172.30.0.12"}},
            {"metadata": {"name": "rook-ceph-mon-a"}, "spec": {"clusterIP": "172.30.0.11"}}
        ]
    })
    .to_string()
}

pub fn success(stdout: &str) -> ExecOutput {
    ExecOutput {
        stdout: stdout.to_string(),
        ..Default::default()
    }
}

#[derive(Default)]
struct ExecState {
    outputs: BTreeMap<String, ExecOutput>,
    executed: Vec<String>,
    delay: Option<Duration>,
}

/// Answers toolbox commands from a table.
#[derive(Clone, Default)]
pub struct FakeExecutor {
    state: Arc<Mutex<ExecState>>,
}

impl FakeExecutor {
    /// Knows the admin key, a pool named `my-pool` and a filesystem
    /// named `ocsci-cephfs`.
    pub fn new() -> Self {
        let key_b64 = format!("{}\n", general_purpose::STANDARD.encode(ADMIN_KEY));
        Self::default()
            .with_output(&format!("sh -c {ADMIN_KEY_COMMAND}"), success(&key_b64))
            .with_output(
                "ceph osd lspools --format json",
                success(r#"[{"poolnum":1,"poolname":"device_health_metrics"},{"poolnum":2,"poolname":"my-pool"}]"#),
            )
            .with_output(
                "ceph fs ls --format json",
                success(
                    r#"[{"name":"ocsci-cephfs","metadata_pool":"ocsci-cephfs-metadata","metadata_pool_id":3,"data_pool_ids":[4],"data_pools":["ocsci-cephfs-data0"]}]"#,
                ),
            )
    }

    pub fn with_output(self, command: &str, output: ExecOutput) -> Self {
        self.set_output(command, output);
        self
    }

    /// Changes an answer, also for clones already handed out.
    pub fn set_output(&self, command: &str, output: ExecOutput) {
        self.state
            .lock()
            .unwrap()
            .outputs
            .insert(command.to_string(), output);
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        self.state.lock().unwrap().delay = Some(delay);
        self
    }

    pub fn executed(&self) -> Vec<String> {
        self.state.lock().unwrap().executed.clone()
    }
}

impl CommandExecutor for FakeExecutor {
    async fn exec(
        &self,
        _namespace: &str,
        _pod: &str,
        command: Vec<String>,
    ) -> provisioner::Result<ExecOutput> {
        let command = command.join(" ");
        let (output, delay) = {
            let mut state = self.state.lock().unwrap();
            state.executed.push(command.clone());
            (state.outputs.get(&command).cloned(), state.delay)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(output.unwrap_or(ExecOutput {
            stderr: format!("{command}: command not found"),
            code: 127,
            ..Default::default()
        }))
    }
}
