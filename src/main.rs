use std::net::{IpAddr, SocketAddr};

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rumor::api;
use rumor::cli;
use rumor::node::NodeWrapper;
use rumor::settings::LogFormat;

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "rumor=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse args and env vars; bad arguments exit with status 1
    let args = cli::Cli::try_parse().unwrap_or_else(|err| {
        let code = if err.use_stderr() { 1 } else { 0 };
        // printing to the terminal can only fail if it is gone
        let _ = err.print();
        std::process::exit(code);
    });
    init_tracing(args.log_format);

    let settings = args.into_settings()?;
    let http_port = settings.http_port();
    let listen_address: IpAddr = settings
        .listen_address()
        .parse()
        .with_context(|| format!("Invalid listen address {:?}", settings.listen_address()))?;

    let node = NodeWrapper::new(settings).await?;
    info!("Starting rumor node {}", node.address());

    match http_port {
        Some(port) => {
            let socket_address = SocketAddr::from((listen_address, port));
            let app = api::api(&node);
            info!("Serving status API on {}", socket_address);
            let server = axum::Server::try_bind(&socket_address)
                .with_context(|| format!("Failed to bind HTTP API on {}", socket_address))?
                .serve(app.into_make_service());
            tokio::select! {
                result = server => result?,
                _ = tokio::signal::ctrl_c() => info!("Interrupted, shutting down"),
            }
        }
        None => {
            tokio::signal::ctrl_c().await?;
            info!("Interrupted, shutting down");
        }
    }

    node.shutdown();
    Ok(())
}
