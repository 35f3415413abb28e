//! Custom resource definition for the `XlineCluster` and the logic to keep it installed and
//! migrated on the API server.

use std::time::Duration;

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::runtime::wait::{await_condition, conditions};
use kube::Api;

/// CRD versions
pub mod version;

/// v1alpha1, the only served version of `XlineCluster`
pub mod v1alpha1;

pub use v1alpha1::{
    set_up, BackupSpec, Cluster, ClusterPhase, ClusterSpec, ClusterStatus, Condition,
    RestoreSpec, S3Spec, SelfHostedSpec, StorageSpec,
};

/// how long we wait for a newly applied CRD to become established
const CRD_ESTABLISH_TIMEOUT: Duration = Duration::from_secs(20);

/// Wait until the named CRD reports an `Established` condition, or time out
pub(crate) async fn wait_crd_established(
    crd_api: Api<CustomResourceDefinition>,
    name: &str,
) -> anyhow::Result<()> {
    let establish = await_condition(crd_api, name, conditions::is_crd_established());
    let _crd = tokio::time::timeout(CRD_ESTABLISH_TIMEOUT, establish).await??;
    Ok(())
}
