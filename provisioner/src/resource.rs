// SPDX-FileCopyrightText: Jakob Naucke <jnaucke@redhat.com>
//
// SPDX-License-Identifier: MIT

use k8s_openapi::NamespaceResourceScope;
use kube::api::{DeleteParams, PostParams};
use kube::{Api, Client, Resource};
use log::info;
use serde::{Serialize, de::DeserializeOwned};
use std::fmt::Debug;
use std::time::Duration;

use crate::poller::Poller;
use crate::{Error, Result, name_or_default};

/// Typed handle on one kind of object, bound to a namespace unless the
/// kind is cluster scoped.
#[derive(Clone)]
pub struct ResourceClient<K> {
    api: Api<K>,
}

impl<K> ResourceClient<K>
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Serialize + Debug,
{
    pub fn namespaced(client: Client, namespace: &str) -> Self
    where
        K: Resource<Scope = NamespaceResourceScope>,
    {
        Self {
            api: Api::namespaced(client, namespace),
        }
    }

    pub fn cluster(client: Client) -> Self {
        Self {
            api: Api::all(client),
        }
    }

    pub fn kind() -> String {
        K::kind(&()).to_string()
    }

    /// Never replaces an existing object: a name clash is an error.
    pub async fn create(&self, resource: &K) -> Result<K> {
        let name = name_or_default(resource.meta());
        match self.api.create(&PostParams::default(), resource).await {
            Ok(created) => {
                info!("Create {} {}", Self::kind(), name);
                Ok(created)
            }
            Err(kube::Error::Api(ae)) if ae.code == 409 => Err(Error::AlreadyExists {
                kind: Self::kind(),
                name,
            }),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get(&self, name: &str) -> Result<K> {
        match self.api.get(name).await {
            Ok(resource) => Ok(resource),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Err(Error::NotFound {
                kind: Self::kind(),
                name: name.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn exists(&self, name: &str) -> Result<bool> {
        match self.get(name).await {
            Ok(_) => Ok(true),
            Err(Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Returns `false` if the object was already gone.
    pub async fn delete(&self, name: &str) -> Result<bool> {
        match self.api.delete(name, &DeleteParams::default()).await {
            Ok(_) => {
                info!("Deleted {} {name}", Self::kind());
                Ok(true)
            }
            Err(kube::Error::Api(ae)) if ae.code == 404 => {
                info!("{} {name} already deleted", Self::kind());
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Polls the object until `condition` holds for it.
    pub async fn wait_for_condition<F>(
        &self,
        name: &str,
        description: &str,
        timeout: Duration,
        interval: Duration,
        condition: F,
    ) -> Result<K>
    where
        F: Fn(&K) -> bool,
    {
        let poller = Poller::new()
            .with_timeout(timeout)
            .with_interval(interval)
            .with_error_message(format!(
                "waiting for {} {name} to be {description}",
                Self::kind()
            ));
        let condition = &condition;
        poller
            .poll_async(|| async move {
                let resource = self.get(name).await?;
                if condition(&resource) {
                    Ok(resource)
                } else {
                    Err(Error::Validation(format!(
                        "{} {name} is not {description}",
                        Self::kind()
                    )))
                }
            })
            .await
    }
}
