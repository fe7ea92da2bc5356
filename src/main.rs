//! mongo-runner entry point.

use clap::Parser;
use log::{debug, info, warn};

mod config;
mod error;
mod image;
mod launcher;
mod runtime;
mod store;
mod template;
mod types;

use config::Settings;
use image::ImageResolver;
use launcher::connection_uri;
use runtime::DockerEngine;
use store::{LaunchRecord, LAST_LAUNCH_KEY};
use types::{Deployment, Topology};

/// Launch a disposable MongoDB deployment in Docker.
#[derive(Debug, Parser)]
#[command(name = "mongo-runner", version, about)]
struct Cli {
    /// MongoDB version, used as the `mongo` base image tag (e.g. 4.4.6)
    #[arg(id = "mongo_version", value_name = "VERSION")]
    version: String,
    /// Deployment shape: `standalone` or `replicaset`
    topology: Topology,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Usage errors (missing or unknown arguments) exit with code 2 here,
    // before the engine is touched.
    let cli = Cli::parse();

    let settings = Settings::load()?;
    debug!("Loaded settings: {:?}", settings);

    let engine = DockerEngine::connect()?;
    let resolver = ImageResolver::new(&engine, &settings.templates_dir);
    let deployment = cli
        .topology
        .launcher(&settings.mongo_shell)
        .launch(&resolver, &cli.version)
        .await?;

    for c in &deployment.containers {
        info!(
            "{} ({}) published on host port {}",
            c.name.as_deref().unwrap_or("mongo"),
            c.id,
            c.host_port
        );
    }
    println!("{}", connection_uri(&deployment));

    if settings.record_launches {
        if let Err(e) = record_launch(&settings, &cli.version, &deployment) {
            warn!("Could not record launch: {:#}", e);
        }
    }

    Ok(())
}

fn record_launch(settings: &Settings, version: &str, deployment: &Deployment) -> anyhow::Result<()> {
    let store = settings.config_store()?;
    store.with_config(|doc| {
        if let Some(previous) = doc.get::<LaunchRecord>(LAST_LAUNCH_KEY) {
            debug!(
                "Replacing last launch record ({} {})",
                previous.version, previous.deployment.topology
            );
        }
        doc.set(
            LAST_LAUNCH_KEY,
            &LaunchRecord {
                version: version.to_string(),
                deployment: deployment.clone(),
            },
        )
    })?;
    debug!("Recorded launch in {}", store.path().display());
    Ok(())
}
