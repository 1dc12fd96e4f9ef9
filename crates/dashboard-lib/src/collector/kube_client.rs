//! Cluster client backed by `kube`
//!
//! Core kinds are listed through typed `Api<T>` handles. OpenShift kinds are
//! listed as `DynamicObject`s against an explicit `ApiResource` and decoded
//! into their record types.

use super::{async_trait, ClusterClient, Selectors};
use crate::error::ClusterError;
use crate::kind::ResourceKind;
use crate::models::{
    Build, BuildConfig, DeploymentConfig, Event, ImageStream, Pod, Project,
    ReplicationController, Resource, Route, Service,
};
use k8s_openapi::NamespaceResourceScope;
use kube::api::{ApiResource, DynamicObject, GroupVersionKind, ListParams};
use kube::config::KubeConfigOptions;
use kube::{Api, Client, Config};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use tracing::{debug, info, warn};

/// [`ClusterClient`] talking to the cluster API server
#[derive(Clone)]
pub struct KubeClusterClient {
    client: Client,
}

impl KubeClusterClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from the ambient credentials
    ///
    /// Tries the in-cluster service account first, then the user's kubeconfig.
    /// Certificate verification stays on unless `insecure_skip_tls_verify` is set.
    pub async fn discover(insecure_skip_tls_verify: bool) -> Result<Self, ClusterError> {
        let mut config = match Config::incluster() {
            Ok(config) => {
                info!(cluster_url = %config.cluster_url, "Using in-cluster configuration");
                config
            }
            Err(e) => {
                warn!(error = %e, "Not running in a cluster, falling back to kubeconfig");
                Config::from_kubeconfig(&KubeConfigOptions::default())
                    .await
                    .map_err(|e| ClusterError::Config(e.to_string()))?
            }
        };

        if insecure_skip_tls_verify {
            warn!("TLS certificate verification against the cluster API is disabled");
            config.accept_invalid_certs = true;
        }

        let client = Client::try_from(config)?;
        Ok(Self::new(client))
    }

    async fn list_core<K>(
        &self,
        namespace: &str,
        params: &ListParams,
    ) -> Result<Vec<K>, ClusterError>
    where
        K: kube::Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
        <K as kube::Resource>::DynamicType: Default,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.list(params).await?.items)
    }

    async fn list_openshift<T: DeserializeOwned>(
        &self,
        kind: ResourceKind,
        namespace: &str,
        params: &ListParams,
    ) -> Result<Vec<T>, ClusterError> {
        let ar = api_resource(kind).ok_or(ClusterError::NotListable(kind))?;

        // Projects are cluster-scoped, the namespace does not apply
        let api: Api<DynamicObject> = if kind == ResourceKind::Project {
            Api::all_with(self.client.clone(), &ar)
        } else {
            Api::namespaced_with(self.client.clone(), namespace, &ar)
        };

        let list = api.list(params).await?;
        decode(kind, list.items)
    }
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    async fn list_projects(&self) -> Result<Vec<Project>, ClusterError> {
        self.list_openshift(ResourceKind::Project, "", &ListParams::default())
            .await
    }

    async fn list(
        &self,
        kind: ResourceKind,
        namespace: &str,
        selectors: &Selectors,
    ) -> Result<Vec<Resource>, ClusterError> {
        let params = list_params(selectors);
        debug!(kind = %kind, namespace = %namespace, "Listing resources");

        let records = match kind {
            ResourceKind::Service => wrap(
                self.list_core::<Service>(namespace, &params).await?,
                Resource::Service,
            ),
            ResourceKind::Pod => wrap(
                self.list_core::<Pod>(namespace, &params).await?,
                Resource::Pod,
            ),
            ResourceKind::ReplicationController => wrap(
                self.list_core::<ReplicationController>(namespace, &params).await?,
                Resource::ReplicationController,
            ),
            ResourceKind::Event => wrap(
                self.list_core::<Event>(namespace, &params).await?,
                Resource::Event,
            ),
            ResourceKind::Project => wrap(
                self.list_openshift::<Project>(kind, namespace, &params).await?,
                Resource::Project,
            ),
            ResourceKind::Route => wrap(
                self.list_openshift::<Route>(kind, namespace, &params).await?,
                Resource::Route,
            ),
            ResourceKind::ImageStream => wrap(
                self.list_openshift::<ImageStream>(kind, namespace, &params).await?,
                Resource::ImageStream,
            ),
            ResourceKind::BuildConfig => wrap(
                self.list_openshift::<BuildConfig>(kind, namespace, &params).await?,
                Resource::BuildConfig,
            ),
            ResourceKind::Build => wrap(
                self.list_openshift::<Build>(kind, namespace, &params).await?,
                Resource::Build,
            ),
            ResourceKind::DeploymentConfig => wrap(
                self.list_openshift::<DeploymentConfig>(kind, namespace, &params).await?,
                Resource::DeploymentConfig,
            ),
            ResourceKind::Application | ResourceKind::Container => {
                return Err(ClusterError::NotListable(kind))
            }
        };
        Ok(records)
    }
}

fn wrap<T>(items: Vec<T>, variant: fn(T) -> Resource) -> Vec<Resource> {
    items.into_iter().map(variant).collect()
}

/// API coordinates of the OpenShift kinds
fn api_resource(kind: ResourceKind) -> Option<ApiResource> {
    let (group, kind_name, plural) = match kind {
        ResourceKind::Project => ("project.openshift.io", "Project", "projects"),
        ResourceKind::Route => ("route.openshift.io", "Route", "routes"),
        ResourceKind::ImageStream => ("image.openshift.io", "ImageStream", "imagestreams"),
        ResourceKind::BuildConfig => ("build.openshift.io", "BuildConfig", "buildconfigs"),
        ResourceKind::Build => ("build.openshift.io", "Build", "builds"),
        ResourceKind::DeploymentConfig => {
            ("apps.openshift.io", "DeploymentConfig", "deploymentconfigs")
        }
        _ => return None,
    };
    let gvk = GroupVersionKind::gvk(group, "v1", kind_name);
    Some(ApiResource::from_gvk_with_plural(&gvk, plural))
}

fn list_params(selectors: &Selectors) -> ListParams {
    let mut params = ListParams::default();
    if let Some(label) = selectors.label.as_deref().filter(|s| !s.is_empty()) {
        params = params.labels(label);
    }
    if let Some(field) = selectors.field.as_deref().filter(|s| !s.is_empty()) {
        params = params.fields(field);
    }
    params
}

fn decode<T: DeserializeOwned>(
    kind: ResourceKind,
    objects: Vec<DynamicObject>,
) -> Result<Vec<T>, ClusterError> {
    objects
        .into_iter()
        .map(|object| {
            serde_json::to_value(object)
                .and_then(serde_json::from_value)
                .map_err(|source| ClusterError::Decode { kind, source })
        })
        .collect()
}
