// SPDX-FileCopyrightText: Alice Frosi <afrosi@redhat.com>
//
// SPDX-License-Identifier: MIT

use log::debug;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, sleep};

use crate::{Error, Result};

/// Repeats an async check at a fixed interval until it succeeds or the
/// timeout expires.
#[derive(Debug, Clone)]
pub struct Poller {
    timeout: Duration,
    interval: Duration,
    error_message: String,
}

impl Default for Poller {
    fn default() -> Self {
        Self::new()
    }
}

impl Poller {
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            interval: Duration::from_secs(5),
            error_message: "waiting for condition".to_string(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = message.into();
        self
    }

    /// The check runs at least once. On timeout the last failure is
    /// appended to the error message.
    pub async fn poll_async<F, Fut, T, E>(&self, mut check: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Display,
    {
        let deadline = Instant::now() + self.timeout;
        loop {
            let last = match check().await {
                Ok(value) => return Ok(value),
                Err(e) => e.to_string(),
            };
            debug!("{}: {last}", self.error_message);
            if Instant::now() + self.interval > deadline {
                return Err(Error::Timeout(format!(
                    "after {:?} {} (last: {last})",
                    self.timeout, self.error_message
                )));
            }
            sleep(self.interval).await;
        }
    }
}
