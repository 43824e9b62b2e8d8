mod builder;
mod config;
mod errors;
mod registry;
mod scrape;
mod sharding;
mod telemetry;

use std::sync::Arc;

use clap::Parser;
use kube::Client;
use ksm_core::logging;
use ksm_core::prelude::*;
use ksm_metrics::ShardConfig;
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;
use tracing::*;

use crate::config::Options;
use crate::errors::StartupError;
use crate::scrape::{GzipEnabled, Readiness, RegistryHandle};
use crate::telemetry::Telemetry;

async fn build_client(opts: &Options) -> anyhow::Result<Client> {
    let mut k8s_config = match &opts.kubeconfig {
        Some(path) => {
            let kubeconfig = kube::config::Kubeconfig::read_from(path)?;
            kube::Config::from_custom_kubeconfig(kubeconfig, &Default::default()).await?
        },
        None => kube::Config::infer().await?,
    };
    if let Some(apiserver) = &opts.apiserver {
        k8s_config.cluster_url = apiserver.parse()?;
    }
    Ok(Client::try_from(k8s_config)?)
}

async fn shard_config(opts: &Options, client: &Client) -> anyhow::Result<ShardConfig> {
    if opts.auto_sharding {
        let namespace = std::env::var("POD_NAMESPACE").unwrap_or_else(|_| "default".to_string());
        sharding::derive(client, &namespace).await
    } else {
        Ok(ShardConfig { index: opts.shard, count: opts.total_shards })
    }
}

/// Drains the builder's readiness channel into the shared [`Readiness`]
/// counter as signals arrive (spec 6 "`GET /healthz`").
async fn drain_readiness(mut ready_rx: tokio::sync::mpsc::Receiver<()>, readiness: Arc<Readiness>) {
    while ready_rx.recv().await.is_some() {
        readiness.mark_one_ready();
    }
}

#[instrument(ret, err)]
async fn run(opts: Options) -> EmptyResult {
    let client = build_client(&opts).await.map_err(StartupError::ClusterUnreachable)?;
    let shard = shard_config(&opts, &client).await.map_err(StartupError::Configuration)?;
    telemetry::record_shard(shard.index, shard.count);

    let telemetry = Arc::new(Telemetry::install()?);

    let mut root_cancel = CancellationToken::new();
    let built = builder::build(&opts, client.clone(), shard, root_cancel.clone()).await?;

    let readiness = Arc::new(Readiness::new(built.expected_ready));
    let registry_handle = Arc::new(RegistryHandle::new(built.registry));
    let mut watch_tasks = built.tasks;

    tokio::spawn(drain_readiness(built.ready_rx, readiness.clone()));

    let rkt_config = rocket::Config { address: opts.host.parse()?, port: opts.port, ..Default::default() };
    let primary = rocket::custom(&rkt_config)
        .mount("/", rocket::routes![scrape::metrics, scrape::healthz])
        .manage(registry_handle.clone())
        .manage(readiness)
        .manage(GzipEnabled(opts.enable_gzip_encoding));

    let telemetry_rkt_config = rocket::Config { address: opts.telemetry_host.parse()?, port: opts.telemetry_port, ..Default::default() };
    let telemetry_server = rocket::custom(&telemetry_rkt_config)
        .mount("/", rocket::routes![telemetry::telemetry_metrics, telemetry::pprof_disabled])
        .manage(telemetry.clone())
        .manage(registry_handle.clone());

    let mut sighup = signal(SignalKind::hangup())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    let mut primary_handle = tokio::spawn(primary.launch());
    let mut telemetry_handle = tokio::spawn(telemetry_server.launch());

    loop {
        tokio::select! {
            _ = watch_tasks.join_next(), if !watch_tasks.is_empty() => {},

            res = &mut primary_handle => {
                return match res {
                    Ok(r) => r.map(|_| ()).map_err(anyhow::Error::from),
                    Err(err) => Err(err.into()),
                };
            },

            res = &mut telemetry_handle => {
                return match res {
                    Ok(r) => r.map(|_| ()).map_err(anyhow::Error::from),
                    Err(err) => Err(err.into()),
                };
            },

            _ = sighup.recv() => {
                info!("SIGHUP received, reloading configuration");
                let fresh_opts = Options::parse();
                let new_cancel = CancellationToken::new();
                match builder::build(&fresh_opts, client.clone(), shard, new_cancel.clone()).await {
                    Ok(new_built) => {
                        let mut new_ready = Arc::new(Readiness::new(new_built.expected_ready));
                        wait_for_ready(new_built.ready_rx, &mut new_ready).await;
                        registry_handle.swap(new_built.registry);
                        root_cancel.cancel();
                        root_cancel = new_cancel;
                        watch_tasks = new_built.tasks;
                    },
                    Err(err) => error!("reload failed, keeping previous configuration: {err:?}"),
                }
            },

            _ = tokio::signal::ctrl_c() => {
                info!("SIGINT received, shutting down");
                root_cancel.cancel();
                return Ok(());
            },

            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down");
                root_cancel.cancel();
                return Ok(());
            },
        }
    }
}

/// Blocks until every new watch driver has completed its first list, so the
/// registry swap on reload (spec 4.K) never exposes a window where `/metrics`
/// serves stores with no data yet.
async fn wait_for_ready(mut ready_rx: tokio::sync::mpsc::Receiver<()>, readiness: &mut Arc<Readiness>) {
    while !readiness.is_ready() {
        match ready_rx.recv().await {
            Some(()) => readiness.mark_one_ready(),
            None => break,
        }
    }
}

#[tokio::main]
async fn main() -> EmptyResult {
    let opts = Options::parse();
    logging::setup(&opts.verbosity);
    run(opts).await
}
