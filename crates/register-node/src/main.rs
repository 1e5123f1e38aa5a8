use anyhow::Context;
use clap::Parser;
use register_node::Node;
use std::sync::Arc;

/// A replica node of the shared register service.
#[derive(Debug, clap::Parser)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Index of this node within the cluster, in 0..total_nodes.
    id: usize,
    /// TCP port to serve on.
    port: u16,
    /// Fixed number of nodes in the cluster. Must be odd.
    total_nodes: usize,
    /// Number of nodes which hold a copy of each address.
    num_replicas: usize,
    /// Address to bind.
    #[clap(long, env = "BIND_ADDR", default_value = "0.0.0.0")]
    bind_addr: std::net::IpAddr,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Reasonable defaults for printing structured logs to stderr.
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting tracing default failed");

    let args = Args::parse();
    anyhow::ensure!(args.total_nodes % 2 == 1, "total_nodes must be odd");
    anyhow::ensure!(
        args.id < args.total_nodes,
        "node id {} is outside the cluster of {} nodes",
        args.id,
        args.total_nodes,
    );
    anyhow::ensure!(
        (1..=args.total_nodes).contains(&args.num_replicas),
        "num_replicas must be in 1..={}",
        args.total_nodes,
    );

    let node = Arc::new(Node::new(args.id, args.total_nodes, args.num_replicas));
    tracing::info!(
        id = %node.id(),
        index = node.index(),
        total_nodes = args.total_nodes,
        num_replicas = args.num_replicas,
        port = args.port,
        "starting replica node"
    );

    let listener = tokio::net::TcpListener::bind((args.bind_addr, args.port))
        .await
        .context("failed to bind server port")?;

    axum::serve(listener, register_node::server::router(node))
        .with_graceful_shutdown(async {
            _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("serving replica node")?;

    Ok(())
}
