use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{AttachParams, AttachedProcess};
use kube::{Api, Client};
use serde::{Deserialize, Serialize};
use tokio::process::{Child, Command};
use tracing::debug;

/// Xline server launch parameters, shared by every backend that knows how to start one
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XlineConfig {
    /// The name of this xline node, shared with the sidecar that supervises it
    pub name: String,
    /// Path to (or name of) the xline executable
    pub executable: String,
    /// Storage engine used by xline, e.g. "rocksdb" or "memory"
    pub storage_engine: String,
    /// Data directory mounted for xline's storage engine
    pub data_dir: String,
    /// Whether this node should be started as the cluster leader
    pub is_leader: bool,
    /// Additional command line parameters appended verbatim
    pub additional: Option<String>,
}

impl XlineConfig {
    /// Build the xline command line arguments from this configuration
    #[must_use]
    pub fn args(&self, members: &str) -> Vec<String> {
        let mut args = vec![
            "--name".to_owned(),
            self.name.clone(),
            "--storage-engine".to_owned(),
            self.storage_engine.clone(),
            "--data-dir".to_owned(),
            self.data_dir.clone(),
            "--members".to_owned(),
            members.to_owned(),
        ];
        if self.is_leader {
            args.push("--is-leader".to_owned());
        }
        if let Some(ref additional) = self.additional {
            args.extend(additional.split_whitespace().map(ToOwned::to_owned));
        }
        args
    }
}

/// Xline handle abstraction: the part of process supervision that differs between
/// running inside a k8s pod (attach/exec into an existing container) and running
/// as a plain child process on the local machine.
#[async_trait]
pub trait XlineHandle: std::fmt::Debug + Send + Sync {
    /// Start (or restart) the xline node, given the current member list rendered as
    /// a `name=url` comma separated string
    async fn start(&mut self, members: &str) -> anyhow::Result<()>;

    /// Kill the xline node
    async fn kill(&mut self) -> anyhow::Result<()>;
}

/// K8s xline handle: attaches to an already running xline container in the same pod
/// and execs the xline binary inside it
#[derive(Debug)]
pub struct K8sXlineHandle {
    /// the pod name
    pod_name: String,
    /// the container name of xline
    container_name: String,
    /// the xline launch parameters
    config: XlineConfig,
    /// k8s pods api
    pods_api: Api<Pod>,
    /// the attached process of xline, present once started
    process: Option<AttachedProcess>,
}

impl K8sXlineHandle {
    /// Construct a new `K8sXlineHandle` with an explicit kube client and pods api
    #[must_use]
    pub fn new(pod_name: String, container_name: String, pods_api: Api<Pod>, config: XlineConfig) -> Self {
        Self {
            pod_name,
            container_name,
            config,
            pods_api,
            process: None,
        }
    }

    /// Construct a new `K8sXlineHandle` using the default in-cluster kube client
    #[must_use]
    pub async fn new_with_default(
        pod_name: String,
        container_name: String,
        namespace: &str,
        config: XlineConfig,
    ) -> Self {
        let kube_client = Client::try_default()
            .await
            .unwrap_or_else(|_ig| unreachable!("it must be setup in k8s environment"));
        Self::new(
            pod_name,
            container_name,
            Api::namespaced(kube_client, namespace),
            config,
        )
    }
}

#[async_trait]
impl XlineHandle for K8sXlineHandle {
    async fn start(&mut self, members: &str) -> anyhow::Result<()> {
        let mut cmd = vec![self.config.executable.clone()];
        cmd.extend(self.config.args(members));
        debug!("attaching to pod {}, cmd: {cmd:?}", self.pod_name);
        let process = self
            .pods_api
            .exec(
                &self.pod_name,
                cmd,
                &AttachParams::default()
                    .container(&self.container_name)
                    .stdin(false),
            )
            .await?;
        self.process = Some(process);
        Ok(())
    }

    async fn kill(&mut self) -> anyhow::Result<()> {
        if let Some(mut process) = self.process.take() {
            process.abort();
        }
        let _ignore = self
            .pods_api
            .exec(
                &self.pod_name,
                vec!["pkill", "-TERM", self.config.executable.as_str()],
                &AttachParams::default().container(&self.container_name),
            )
            .await?;
        Ok(())
    }
}

/// Local xline handle: spawns xline as a plain child process, used outside k8s
#[derive(Debug)]
pub struct LocalXlineHandle {
    /// the xline launch parameters
    config: XlineConfig,
    /// the running child process, present once started
    child: Option<Child>,
}

impl LocalXlineHandle {
    /// Construct a new `LocalXlineHandle`
    #[must_use]
    pub fn new(config: XlineConfig) -> Self {
        Self {
            config,
            child: None,
        }
    }
}

#[async_trait]
impl XlineHandle for LocalXlineHandle {
    async fn start(&mut self, members: &str) -> anyhow::Result<()> {
        let child = Command::new(&self.config.executable)
            .args(self.config.args(members))
            .kill_on_drop(true)
            .spawn()?;
        self.child = Some(child);
        Ok(())
    }

    async fn kill(&mut self) -> anyhow::Result<()> {
        if let Some(mut child) = self.child.take() {
            child.kill().await?;
        }
        Ok(())
    }
}
