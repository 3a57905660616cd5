//! bktunnel: build a Dockerfile on the engine's embedded BuildKit through the h2c tunnel

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use buildkit_tunnel::config::{DEFAULT_HOST, HOST_ENV, UPGRADE_PATH_ENV};
use buildkit_tunnel::session::upgrade::DEFAULT_UPGRADE_PATH;
use buildkit_tunnel::{EngineConfig, Session};

#[derive(Parser, Debug)]
#[command(name = "bktunnel")]
#[command(version, about = "Build a Dockerfile through the engine's BuildKit tunnel")]
struct Args {
    /// Build context directory.
    #[arg(default_value = ".")]
    context: PathBuf,

    /// Dockerfile, relative to the context.
    #[arg(short = 'f', long, default_value = "Dockerfile")]
    file: PathBuf,

    /// Engine address.
    #[arg(long, env = HOST_ENV, default_value = DEFAULT_HOST)]
    host: String,

    /// HTTP path answering the h2c upgrade.
    #[arg(long, env = UPGRADE_PATH_ENV, default_value = DEFAULT_UPGRADE_PATH)]
    upgrade_path: String,
}

#[derive(Serialize)]
struct Output {
    build_id: String,
    result: HashMap<String, String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %args.host,
        "Starting bktunnel"
    );

    let config = EngineConfig::new(args.host).upgrade_path(args.upgrade_path);
    let session = Session::connect(&config)
        .await
        .context("Failed to start tunnel session")?;

    let build = session.create_build(args.context, args.file);
    let build_id = build.id().to_string();
    let outcome = build.run().await;
    session.close().await;

    let result = outcome.with_context(|| format!("Build {build_id} failed"))?;
    let output = Output { build_id, result };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
