//! Manifest builders and orchestrator primitives for pod+service pairs backing cluster members.
//!
//! One member is one pod; each pod owns a sibling ClusterIP service so that deleting the pod
//! cascades deletion of the service without the controller needing to track the pair itself.
//! A second, cluster-owned service fronts the whole cluster for client traffic.

use std::collections::BTreeMap;
use std::time::Duration;

use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvVar, Pod, PodSpec, Service, ServicePort, ServiceSpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta, OwnerReference};
use kube::api::{DeleteParams, ListParams, PostParams, PropagationPolicy};
use kube::{Api, Resource, ResourceExt};

use crd_api::Cluster;
use operator_api::consts::{DEFAULT_BACKUP_DIR, DEFAULT_DATA_DIR};

use crate::consts::{
    ANNOTATION_INHERIT_LABELS_PREFIX, DEFAULT_SIDECAR_PORT, DEFAULT_XLINE_PORT,
    LABEL_CLUSTER_COMPONENT, LABEL_CLUSTER_NAME, LABEL_OPERATOR_VERSION, LB_SERVICE_SUFFIX,
    SIDECAR_PORT_NAME, XLINE_CLUSTER_TOKEN_ENV, XLINE_INITIAL_CLUSTER_ENV,
    XLINE_MEMBER_STATE_ENV, XLINE_POD_NAME_ENV, XLINE_PORT_NAME, XLINE_RECOVERY_ENV,
};
use crate::error::{is_conflict, is_not_found, ClusterError};

use super::member::Member;

/// `component` label value for a member pod/service
const COMPONENT_NODE: &str = "node";
/// `component` label value for the cluster-wide client load balancer service
const COMPONENT_CLIENT: &str = "client";

/// Everything needed to turn a [`Member`] into orchestrator manifests, bound to one cluster
pub(crate) struct ResourceBuilder<'a> {
    /// the cluster this builder generates resources for
    cluster: &'a Cluster,
    /// the Kubernetes DNS domain suffix in use on this cluster, e.g. `cluster.local`
    cluster_suffix: &'a str,
}

impl<'a> ResourceBuilder<'a> {
    /// Build a resource builder for `cluster`, resolving member DNS names against
    /// `cluster_suffix`
    pub(crate) fn new(cluster: &'a Cluster, cluster_suffix: &'a str) -> Self {
        Self {
            cluster,
            cluster_suffix,
        }
    }

    /// Name and namespace of the owning cluster object
    #[allow(clippy::expect_used)] // cluster objects are always fetched from the apiserver with identity populated
    fn id(&self) -> (&str, &str) {
        let name = self
            .cluster
            .metadata
            .name
            .as_deref()
            .expect("xlinecluster resource should have a name");
        let namespace = self
            .cluster
            .metadata
            .namespace
            .as_deref()
            .expect("xlinecluster resource should have a namespace");
        (name, namespace)
    }

    /// Labels annotated onto this cluster that should propagate onto every owned subresource
    fn inherit_labels(&self) -> BTreeMap<String, String> {
        let Some(prefixes) = self
            .cluster
            .metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(ANNOTATION_INHERIT_LABELS_PREFIX))
        else {
            return BTreeMap::new();
        };
        let prefixes: Vec<_> = prefixes
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        let Some(labels) = self.cluster.metadata.labels.as_ref() else {
            return BTreeMap::new();
        };
        labels
            .iter()
            .filter(|(l, _)| prefixes.iter().any(|p| l.starts_with(*p)))
            .map(|(l, v)| (l.clone(), v.clone()))
            .collect()
    }

    /// Selector/identity labels shared by a member's pod and its sibling service
    fn member_labels(cluster_name: &str, member_name: &str) -> BTreeMap<String, String> {
        BTreeMap::from([
            (LABEL_CLUSTER_NAME.to_owned(), cluster_name.to_owned()),
            (LABEL_CLUSTER_COMPONENT.to_owned(), COMPONENT_NODE.to_owned()),
            ("xlinecluster/member".to_owned(), member_name.to_owned()),
        ])
    }

    /// Owner reference pointing at this cluster object
    #[allow(clippy::expect_used)] // cluster objects are always fetched from the apiserver with identity populated
    fn cluster_owner_ref(&self) -> OwnerReference {
        self.cluster
            .controller_owner_ref(&())
            .expect("xlinecluster resource missing name or uid")
    }

    /// General object metadata shared by member pod and the client load balancer service;
    /// member-service metadata is built separately since it is owned by the pod, not the cluster
    fn base_metadata(&self, name: String, mut labels: BTreeMap<String, String>) -> ObjectMeta {
        let (_, namespace) = self.id();
        labels.extend(self.inherit_labels());
        _ = labels.insert(
            LABEL_OPERATOR_VERSION.to_owned(),
            env!("CARGO_PKG_VERSION").to_owned(),
        );
        ObjectMeta {
            name: Some(name),
            namespace: Some(namespace.to_owned()),
            labels: Some(labels),
            owner_references: Some(vec![self.cluster_owner_ref()]),
            ..ObjectMeta::default()
        }
    }

    /// Extract the xline/sidecar container ports declared on the cluster's container spec,
    /// filling in defaults when the user did not name a port `xline`/`sidecar`
    fn ports(&self) -> (ContainerPort, ContainerPort) {
        let declared = self
            .cluster
            .spec
            .container
            .ports
            .clone()
            .unwrap_or_default();
        let xline = declared
            .iter()
            .find(|p| matches!(p.name.as_deref(), Some(XLINE_PORT_NAME)))
            .cloned()
            .unwrap_or(ContainerPort {
                name: Some(XLINE_PORT_NAME.to_owned()),
                container_port: DEFAULT_XLINE_PORT,
                ..ContainerPort::default()
            });
        let sidecar = declared
            .iter()
            .find(|p| matches!(p.name.as_deref(), Some(SIDECAR_PORT_NAME)))
            .cloned()
            .unwrap_or(ContainerPort {
                name: Some(SIDECAR_PORT_NAME.to_owned()),
                container_port: DEFAULT_SIDECAR_PORT,
                ..ContainerPort::default()
            });
        (xline, sidecar)
    }

    /// Peer/client URLs this member would be reachable at once its service exists
    fn urls(&self, member_name: &str) -> (String, String) {
        let (_, namespace) = self.id();
        let (xline_port, sidecar_port) = self.ports();
        let host = format!("{member_name}.{namespace}.svc.{}", self.cluster_suffix);
        (
            format!("https://{host}:{}", sidecar_port.container_port),
            format!("https://{host}:{}", xline_port.container_port),
        )
    }

    /// Build the pod manifest for `member`.
    ///
    /// `cluster_token` is set only for a freshly seeded (`state == New`) member. `initial_cluster`
    /// is the `name=peer_url` membership list the replica process bootstraps or joins against.
    /// `recovering` injects the sidecar's restore-from-backup flag.
    pub(crate) fn pod(
        &self,
        member: &Member,
        cluster_token: Option<&str>,
        initial_cluster: &[Member],
        recovering: bool,
    ) -> Pod {
        let mut container = self.cluster.spec.container.clone();
        let (xline_port, sidecar_port) = self.ports();
        container.ports = Some(vec![xline_port, sidecar_port]);

        let mut env = container.env.clone().unwrap_or_default();
        env.push(EnvVar {
            name: XLINE_POD_NAME_ENV.to_owned(),
            value: Some(member.name.clone()),
            ..EnvVar::default()
        });
        env.push(EnvVar {
            name: XLINE_MEMBER_STATE_ENV.to_owned(),
            value: Some(member.state.as_str().to_owned()),
            ..EnvVar::default()
        });
        env.push(EnvVar {
            name: XLINE_INITIAL_CLUSTER_ENV.to_owned(),
            value: Some(
                initial_cluster
                    .iter()
                    .map(|m| format!("{}={}", m.name, m.peer_url))
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            ..EnvVar::default()
        });
        if let Some(token) = cluster_token {
            env.push(EnvVar {
                name: XLINE_CLUSTER_TOKEN_ENV.to_owned(),
                value: Some(token.to_owned()),
                ..EnvVar::default()
            });
        }
        if recovering {
            env.push(EnvVar {
                name: XLINE_RECOVERY_ENV.to_owned(),
                value: Some("true".to_owned()),
                ..EnvVar::default()
            });
        }
        container.env = Some(env);

        let backup_volume_mounts = self
            .cluster
            .spec
            .backup
            .iter()
            .filter_map(|b| b.storage.as_pvc().cloned())
            .map(|pvc| k8s_openapi::api::core::v1::VolumeMount {
                name: pvc.name_any(),
                mount_path: DEFAULT_BACKUP_DIR.to_owned(),
                ..k8s_openapi::api::core::v1::VolumeMount::default()
            });
        let data_volume_mounts =
            self.cluster
                .spec
                .data
                .iter()
                .cloned()
                .map(|pvc| k8s_openapi::api::core::v1::VolumeMount {
                    name: pvc.name_any(),
                    mount_path: DEFAULT_DATA_DIR.to_owned(),
                    ..k8s_openapi::api::core::v1::VolumeMount::default()
                });
        let mut mounts = container.volume_mounts.clone().unwrap_or_default();
        mounts.extend(backup_volume_mounts);
        mounts.extend(data_volume_mounts);
        if !mounts.is_empty() {
            container.volume_mounts = Some(mounts);
        }

        Pod {
            metadata: self.base_metadata(
                member.name.clone(),
                Self::member_labels(self.id().0, &member.name),
            ),
            spec: Some(PodSpec {
                containers: vec![container],
                affinity: self.cluster.spec.affinity.clone(),
                ..PodSpec::default()
            }),
            status: None,
        }
    }

    /// Build the per-member service, to be created owned by the pod (not the cluster)
    pub(crate) fn member_service(&self, member: &Member, pod: &Pod) -> Service {
        let (cluster_name, namespace) = self.id();
        let (xline_port, sidecar_port) = self.ports();
        let owner_ref = pod
            .controller_owner_ref(&())
            .unwrap_or_else(|| OwnerReference {
                api_version: "v1".to_owned(),
                kind: "Pod".to_owned(),
                name: member.name.clone(),
                uid: String::new(),
                ..OwnerReference::default()
            });
        let mut labels = Self::member_labels(cluster_name, &member.name);
        labels.extend(self.inherit_labels());
        Service {
            metadata: ObjectMeta {
                name: Some(member.name.clone()),
                namespace: Some(namespace.to_owned()),
                labels: Some(labels.clone()),
                owner_references: Some(vec![owner_ref]),
                ..ObjectMeta::default()
            },
            spec: Some(ServiceSpec {
                selector: Some(labels),
                cluster_ip: Some("None".to_owned()),
                ports: Some(vec![
                    ServicePort {
                        name: Some(XLINE_PORT_NAME.to_owned()),
                        port: xline_port.container_port,
                        ..ServicePort::default()
                    },
                    ServicePort {
                        name: Some(SIDECAR_PORT_NAME.to_owned()),
                        port: sidecar_port.container_port,
                        ..ServicePort::default()
                    },
                ]),
                ..ServiceSpec::default()
            }),
            status: None,
        }
    }

    /// Build the cluster-wide client load balancer service, owned by the cluster itself
    pub(crate) fn client_service(&self) -> Service {
        let (cluster_name, _) = self.id();
        let (xline_port, _) = self.ports();
        let name = format!("{cluster_name}-{LB_SERVICE_SUFFIX}");
        let mut selector = BTreeMap::from([(LABEL_CLUSTER_NAME.to_owned(), cluster_name.to_owned())]);
        selector.insert(LABEL_CLUSTER_COMPONENT.to_owned(), COMPONENT_NODE.to_owned());
        Service {
            metadata: self.base_metadata(
                name,
                BTreeMap::from([(LABEL_CLUSTER_COMPONENT.to_owned(), COMPONENT_CLIENT.to_owned())]),
            ),
            spec: Some(ServiceSpec {
                selector: Some(selector),
                ports: Some(vec![ServicePort {
                    name: Some(XLINE_PORT_NAME.to_owned()),
                    port: xline_port.container_port,
                    ..ServicePort::default()
                }]),
                ..ServiceSpec::default()
            }),
            status: None,
        }
    }

    /// Peer/client URLs a member would be reachable at, for use constructing [`Member`] values
    /// before its pod/service exist
    pub(crate) fn member_urls(&self, member_name: &str) -> (String, String) {
        self.urls(member_name)
    }
}

/// Create a member's pod, then its sibling service.
///
/// Pod creation failure is fatal; the service's "already exists" is tolerated since a prior
/// pending-GC service from a reused name is expected to disappear on its own.
pub(crate) async fn create_member(
    pod_api: &Api<Pod>,
    svc_api: &Api<Service>,
    pod: Pod,
    svc_builder: impl FnOnce(&Pod) -> Service,
) -> Result<(), ClusterError> {
    let created = pod_api.create(&PostParams::default(), &pod).await?;
    match svc_api
        .create(&PostParams::default(), &svc_builder(&created))
        .await
    {
        Ok(_) => Ok(()),
        Err(err) if is_conflict(&err) => Ok(()),
        Err(err) => Err(err.into()),
    }
}

/// Remove a member's service then its pod, ignoring not-found on either. `grace` is the
/// termination grace period given to the pod.
pub(crate) async fn remove_member(
    pod_api: &Api<Pod>,
    svc_api: &Api<Service>,
    member_name: &str,
    grace: Duration,
) -> Result<(), ClusterError> {
    match svc_api.delete(member_name, &DeleteParams::default()).await {
        Ok(_) => {}
        Err(err) if is_not_found(&err) => {}
        Err(err) => return Err(err.into()),
    }
    let dp = DeleteParams {
        grace_period_seconds: Some(grace.as_secs() as u32),
        propagation_policy: Some(PropagationPolicy::Background),
        ..DeleteParams::default()
    };
    match pod_api.delete(member_name, &dp).await {
        Ok(_) => {}
        Err(err) if is_not_found(&err) => {}
        Err(err) => return Err(err.into()),
    }
    Ok(())
}

/// Pods partitioned by phase, the shape the reconcile loop acts on
#[derive(Debug, Default)]
pub(crate) struct PolledPods {
    /// pods reporting `Running`
    pub(crate) running: Vec<Pod>,
    /// pods reporting anything other than `Running` (typically `Pending`)
    pub(crate) pending: Vec<Pod>,
}

/// List pods belonging to `cluster_name`, discard any without an owner reference identifying
/// this cluster (defends against stale pods surviving a name reuse), and partition by phase.
pub(crate) async fn poll_pods(
    pod_api: &Api<Pod>,
    cluster_uid: &str,
    cluster_name: &str,
) -> Result<PolledPods, ClusterError> {
    let lp = ListParams::default().labels(&format!("{LABEL_CLUSTER_NAME}={cluster_name}"));
    let list = pod_api.list(&lp).await?;
    let mut polled = PolledPods::default();
    for pod in list.items {
        let owned_by_cluster = pod
            .metadata
            .owner_references
            .as_ref()
            .and_then(|refs| refs.first())
            .is_some_and(|owner| owner.uid == cluster_uid);
        if !owned_by_cluster {
            continue;
        }
        let running = pod
            .status
            .as_ref()
            .and_then(|s| s.phase.as_deref())
            .is_some_and(|phase| phase == "Running");
        if running {
            polled.running.push(pod);
        } else {
            polled.pending.push(pod);
        }
    }
    Ok(polled)
}

#[cfg(test)]
mod test {
    use super::*;
    use super::super::member::MemberState;

    static CLUSTER: &str = r#"
apiVersion: xlineoperator.xline.cloud/v1alpha1
kind: XlineCluster
metadata:
  name: my-xline-cluster
  namespace: default
  uid: this-is-a-random-uid
spec:
  size: 3
  container:
    image: "datenlord/xline"
    name: "my-xline"
    "#;

    fn builder(cluster: &Cluster) -> ResourceBuilder<'_> {
        ResourceBuilder::new(cluster, "cluster.local")
    }

    fn member(name: &str) -> Member {
        Member {
            name: name.to_owned(),
            peer_url: String::new(),
            client_url: String::new(),
            self_hosted: false,
            state: MemberState::Existing,
        }
    }

    #[test]
    fn ports_fall_back_to_defaults_when_unnamed() {
        let cluster: Cluster = serde_yaml::from_str(CLUSTER).unwrap();
        let (xline, sidecar) = builder(&cluster).ports();
        assert_eq!(xline.container_port, DEFAULT_XLINE_PORT);
        assert_eq!(sidecar.container_port, DEFAULT_SIDECAR_PORT);
    }

    #[test]
    fn pod_manifest_carries_owner_reference_and_member_name() {
        let cluster: Cluster = serde_yaml::from_str(CLUSTER).unwrap();
        let member = member("my-xline-cluster-0000");
        let pod = builder(&cluster).pod(&member, Some("token"), &[member.clone()], false);
        assert_eq!(pod.metadata.name.as_deref(), Some("my-xline-cluster-0000"));
        assert_eq!(
            pod.metadata.owner_references.as_ref().unwrap()[0].name,
            "my-xline-cluster"
        );
    }

    #[test]
    fn client_service_name_carries_suffix() {
        let cluster: Cluster = serde_yaml::from_str(CLUSTER).unwrap();
        let svc = builder(&cluster).client_service();
        assert_eq!(
            svc.metadata.name.as_deref(),
            Some("my-xline-cluster-client")
        );
    }
}
