//! Bootstrap and the long-running node process: config (clap), the entry
//! node handshake, and wiring the listener together with the periodic
//! maintenance tick. Grounded on the DB server's CLI config shape and the
//! `SkipNodeFactory`/`HashNodeFactory` entry-node handshake.
use clap::{ArgAction, Args, Parser, Subcommand};
use skipplus_types::node::NodeRef;
use std::sync::Arc;
use std::time::Duration;
use task_manager::TaskManager;

use crate::dht::HashNode;
use crate::errors::OverlayResult;
use crate::protocol::Listener;

#[derive(Parser)]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Starts a SKIP+ overlay node
    Run(NodeConfig),
}

#[derive(Args, Debug, Clone)]
pub struct NodeConfig {
    #[arg(long, default_value_t = String::from("127.0.0.1"))]
    pub host: String,

    #[arg(long, default_value_t = 1400)]
    pub port: u16,

    /// An already-running peer to join through. If unset, this node starts
    /// its own, empty ring.
    #[arg(long)]
    pub entry_host: Option<String>,

    #[arg(long, requires = "entry_host")]
    pub entry_port: Option<u16>,

    /// How often to run the periodic maintenance tick, in milliseconds.
    #[arg(long, default_value_t = 5000)]
    pub tick_interval_ms: u64,

    /// Caps concurrently connected peers for the listener.
    #[arg(long, default_value_t = 1024)]
    pub maximum_clients: usize,

    /// Limits the size (in bytes) of an expected RPC payload, defaults to
    /// 1MiB (1 * 1024 * 1024).
    #[arg(long, default_value_t = 1_048_576)]
    pub maximum_message_size: u64,

    /// Sets the size (in bytes) for the global allocator used. Defaults to
    /// 1 Gi (1 * 1024 * 1024 * 1024).
    #[arg(long, default_value_t = 1_073_741_824)]
    pub allocator_size: usize,

    #[arg(long, default_value_t = false, action = ArgAction::SetTrue)]
    pub enable_tracing: bool,

    #[arg(long, default_value_t = String::from("info"))]
    pub log_level: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            host: String::from("127.0.0.1"),
            #[cfg(not(test))]
            port: 1400,
            #[cfg(test)]
            port: 0,
            entry_host: None,
            entry_port: None,
            tick_interval_ms: 5000,
            maximum_clients: 1024,
            maximum_message_size: 1_048_576,
            allocator_size: 1_073_741_824,
            enable_tracing: false,
            log_level: String::from("info"),
        }
    }
}

/// Builds a `HashNode` for `config` and, if an entry peer is configured,
/// fetches its random bit string and linearises both sides against each
/// other. Failing to reach the entry node is logged, not fatal: the new
/// node still starts, just unconnected to any ring until a future tick or
/// remote `linearise` call reaches it.
pub async fn bootstrap(config: &NodeConfig) -> OverlayResult<Arc<HashNode>> {
    let node = Arc::new(HashNode::new(config.host.clone(), config.port));

    if let (Some(entry_host), Some(entry_port)) = (&config.entry_host, config.entry_port) {
        let entry_client = skipplus_client::registry::client_for(entry_host, *entry_port);
        match entry_client.get_rs().await {
            Ok(rs) => {
                let entry_ref = NodeRef::new(entry_host.clone(), entry_port, rs);
                node.linearise(entry_ref.clone()).await;
                if let Err(e) = entry_client.linearise(node.reference()).await {
                    tracing::warn!(
                        "could not introduce ourselves to entry node {entry_host}:{entry_port}: {e}"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(
                    "failed to fetch entry node {entry_host}:{entry_port}'s random bit string, \
                     this node will not be connected to any other host yet: {e}"
                );
            }
        }
    }

    Ok(node)
}

/// Runs the listener and the periodic maintenance tick until the task
/// manager's cancellation token fires (Ctrl-C, or an external trigger),
/// then hands this node's entries off to its predecessor before returning.
pub async fn run(config: NodeConfig, node: Arc<HashNode>) -> OverlayResult<()> {
    let listener = Listener::bind(
        &config.host,
        config.port,
        node.clone(),
        config.maximum_clients,
        config.maximum_message_size,
    )
    .await?;

    let task_manager = TaskManager::new();
    let tick_interval = Duration::from_millis(config.tick_interval_ms);
    let tick_node = node.clone();
    task_manager
        .spawn_task_loop(
            move |guard| async move {
                loop {
                    tokio::select! {
                        _ = guard.is_cancelled() => break,
                        _ = tokio::time::sleep(tick_interval) => {
                            tick_node.timeout().await;
                        }
                    }
                }
            },
            "overlay-maintenance-tick".to_string(),
        )
        .await;

    tokio::select! {
        result = listener.serve() => { result?; }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received shutdown signal, handing off entries before exit");
        }
    }

    task_manager.cancel_all();
    task_manager.wait().await;
    node.shutdown().await;
    Ok(())
}
