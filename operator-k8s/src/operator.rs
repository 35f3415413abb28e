use std::sync::Arc;

use anyhow::Result;
use axum::routing::{get, post};
use axum::{Extension, Router};
use flume::Sender;
use futures::FutureExt;
use k8s_openapi::api::core::v1::Pod;
use kube::{Api, Client, CustomResourceExt};
use operator_api::HeartbeatStatus;
use tokio::signal;
use tracing::{info, warn};

use crd_api::Cluster;

use crate::config::{Config, Namespace};
use crate::manager::ClusterManager;
use crate::metrics;
use crate::monitor::SidecarMonitor;
use crate::router;

/// Xline Operator for k8s
#[derive(Debug)]
pub struct Operator {
    /// Config of this operator
    config: Config,
}

impl Operator {
    /// Constructor
    #[inline]
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run operator
    ///
    /// # Errors
    ///
    /// Return `Err` when run failed
    #[inline]
    pub async fn run(&self) -> Result<()> {
        metrics::init();
        let kube_client: Client = Client::try_default().await?;
        crd_api::set_up(&kube_client, self.config.manage_crd, self.config.auto_migration).await?;

        let (cluster_api, pod_api): (Api<Cluster>, Api<Pod>) = match self.config.namespace {
            Namespace::Single(ref namespace) => (
                Api::namespaced(kube_client.clone(), namespace.as_str()),
                Api::namespaced(kube_client.clone(), namespace.as_str()),
            ),
            Namespace::ClusterWide => {
                (Api::all(kube_client.clone()), Api::all(kube_client.clone()))
            }
        };

        let (status_tx, status_rx) = flume::unbounded();
        let graceful_shutdown_event = event_listener::Event::new();
        let forceful_shutdown = async {
            info!("press ctrl+c to shut down gracefully");
            let _ctrl_c = tokio::signal::ctrl_c().await;
            graceful_shutdown_event.notify(usize::MAX);
            info!("graceful shutdown already requested, press ctrl+c again to force shut down");
            let _ctrl_c_c = tokio::signal::ctrl_c().await;
        };

        let web_server = self.web_server(status_tx);

        let monitor_task = SidecarMonitor::new(
            status_rx,
            self.config.heartbeat_period,
            self.config.unreachable_thresh,
            cluster_api.clone(),
            pod_api,
        )
        .run_with_graceful_shutdown(graceful_shutdown_event.listen());

        let manager = ClusterManager::new(
            kube_client,
            self.config.cluster_suffix.clone(),
            self.config.timing(),
        );
        let manager_task = manager.run(cluster_api, graceful_shutdown_event.listen());

        tokio::pin!(forceful_shutdown);
        tokio::pin!(web_server);
        tokio::pin!(monitor_task);
        tokio::pin!(manager_task);

        let mut web_server_shutdown = false;
        let mut manager_shutdown = false;
        let mut monitor_shutdown = false;

        loop {
            tokio::select! {
                () = &mut forceful_shutdown => {
                    warn!("forceful shutdown");
                    break
                }
                res = &mut monitor_task, if !monitor_shutdown => {
                    res?;
                    monitor_shutdown = true;
                    info!("sidecar monitor graceful shutdown");
                }
                res = &mut web_server, if !web_server_shutdown => {
                    res?;
                    web_server_shutdown = true;
                    info!("web server graceful shutdown");
                }
                () = &mut manager_task, if !manager_shutdown => {
                    manager_shutdown = true;
                    info!("cluster manager graceful shutdown");
                }
            }

            if web_server_shutdown && manager_shutdown && monitor_shutdown {
                break;
            }
        }

        Ok(())
    }

    /// Generate the `XlineCluster` CRD manifest to stdout
    ///
    /// # Errors
    ///
    /// Return `Err` if the CRD cannot be serialized
    #[inline]
    pub fn generate_crds(&self) -> Result<()> {
        let crd = serde_yaml::to_string(&Cluster::crd())?;
        println!("{crd}");
        Ok(())
    }

    /// Run a server that serves health, metrics, and the sidecar heartbeat ingestion route
    async fn web_server(&self, status_tx: Sender<HeartbeatStatus>) -> Result<()> {
        let app = Router::new()
            .route("/healthz", get(router::healthz))
            .route("/metrics", get(metrics::metrics))
            .route("/status", post(router::sidecar_monitor))
            .layer(Extension(status_tx));

        axum::Server::bind(&self.config.listen_addr.parse()?)
            .serve(app.into_make_service())
            .with_graceful_shutdown(signal::ctrl_c().map(|_| ()))
            .await?;

        Ok(())
    }
}
