// SPDX-FileCopyrightText: Jakob Naucke <jnaucke@redhat.com>
//
// SPDX-License-Identifier: MIT

use std::fmt;

use crate::fixture::FixtureState;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{kind} {name} already exists")]
    AlreadyExists { kind: String, name: String },

    #[error("{kind} {name} not found")]
    NotFound { kind: String, name: String },

    #[error(transparent)]
    Kube(#[from] kube::Error),

    #[error("command `{command}` exited with code {code}: {stderr}")]
    Command {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("timed out {0}")]
    Timeout(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("fixture is {actual}, expected {expected}")]
    InvalidState {
        actual: FixtureState,
        expected: FixtureState,
    },

    #[error("no pod with label {selector} in namespace {namespace}")]
    NoToolsPod { selector: String, namespace: String },

    #[error("unexpected command output: {0}")]
    Output(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Base64(#[from] base64::DecodeError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("teardown failed: {}", TeardownFailures(.0))]
    Teardown(Vec<TeardownFailure>),
}

/// A delete that did not go through during teardown.
#[derive(Debug)]
pub struct TeardownFailure {
    pub resource: String,
    pub error: Error,
}

struct TeardownFailures<'a>(&'a [TeardownFailure]);

impl fmt::Display for TeardownFailures<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}: {}", failure.resource, failure.error)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_teardown_lists_every_failure() {
        let err = Error::Teardown(vec![
            TeardownFailure {
                resource: "StorageClass sc".to_string(),
                error: Error::Timeout("deleting".to_string()),
            },
            TeardownFailure {
                resource: "Secret s".to_string(),
                error: Error::Validation("boom".to_string()),
            },
        ]);
        assert_eq!(
            err.to_string(),
            "teardown failed: StorageClass sc: timed out deleting; Secret s: validation failed: boom"
        );
    }
}
