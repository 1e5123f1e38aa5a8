use anyhow::Context;
use clap::Parser;
use register_client::Coordinator;
use std::sync::Arc;

/// A client coordinator of the shared register service.
#[derive(Debug, clap::Parser)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Label for this client process, used in logs.
    id: String,
    /// TCP port to serve the front-end on.
    port: u16,
    /// Fixed number of replica nodes in the cluster. Must be odd.
    total_nodes: usize,
    /// Port of replica 0. Replica ports are contiguous from here.
    first_node_port: u16,
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

    let coordinator = Arc::new(Coordinator::new(args.total_nodes, args.first_node_port));
    tracing::info!(
        label = %args.id,
        id = %coordinator.id(),
        total_nodes = args.total_nodes,
        first_node_port = args.first_node_port,
        port = args.port,
        "starting client coordinator"
    );

    let listener = tokio::net::TcpListener::bind((args.bind_addr, args.port))
        .await
        .context("failed to bind server port")?;

    axum::serve(listener, register_client::server::router(coordinator))
        .with_graceful_shutdown(async {
            _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("serving client coordinator")?;

    Ok(())
}
