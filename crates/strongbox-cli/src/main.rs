mod cli;
mod config;
mod secrets;
mod storage;

use crate::cli::{Command, ConfigCommand};
use clap::Parser;
use color_eyre::Result;
use strongbox_core::{Accessibility, AsyncStore, Key, SecureStoreProvider};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Entry point wiring the CLI to the encrypted secret store.
#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let cli = cli::Cli::parse();
    let config = config::load()?;
    match cli.command {
        Command::Version => print_version(),
        Command::Config(ConfigCommand::Init) => init_config(&config)?,
        Command::Health => run_health_check(&config).await?,
        command => {
            let store = storage::store_from_config(&config, cli.service.as_deref())?;
            secrets::handle(command, &store, &config).await?
        }
    }

    Ok(())
}

fn init_tracing() {
    // Respect user-provided filters, default to info to avoid noisy stdout.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

fn print_version() {
    println!("strongbox {}", env!("CARGO_PKG_VERSION"));
}

/// Runs a quick health check of the encrypted storage path.
async fn run_health_check(config: &config::Config) -> Result<()> {
    let store = storage::health_store_from_config(config)?;
    run_store_health(&store).await?;
    println!("Storage: ok");
    Ok(())
}

async fn run_store_health<P: SecureStoreProvider>(store: &AsyncStore<P>) -> Result<()> {
    let check_key = Key::new("health/check")?;
    let payload = b"ok";
    if store.contains_item(&check_key).await? {
        color_eyre::eyre::bail!(
            "`{check_key}` already exists in {}; refusing to overwrite it",
            store.service()
        );
    }
    store
        .set_data(
            &check_key,
            payload,
            Accessibility::WhenUnlockedThisDeviceOnly,
        )
        .await?;
    let round_trip = store.data(&check_key).await?;
    store.remove_item(&check_key).await?;

    if round_trip.as_deref() != Some(payload.as_slice()) {
        color_eyre::eyre::bail!("storage round-trip failed");
    }
    if store.contains_item(&check_key).await? {
        color_eyre::eyre::bail!("storage check item survived removal");
    }
    Ok(())
}

fn init_config(config: &config::Config) -> Result<()> {
    let path = config::write_default_if_missing(config)?;
    println!("Config initialized at {}", path.display());
    Ok(())
}
