use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use datasource_infra::config::{transform_datasource_config, BridgeSettings, ConfigTree};
use datasource_infra::infra::db::{
    create_database_if_missing, database_exists, shutdown_embedded_database, DatasourceFactory,
    SeaBridge, TcpPingFactory,
};
use datasource_infra::DbInfraError;
use tokio_util::sync::CancellationToken;

const ENV_PREFIX: &str = "DATASOURCE__";

#[derive(Parser)]
#[command(name = "datasource")]
#[command(about = "Inspect and validate the configured datasource")]
struct Args {
    /// Properties file holding the host configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Key prefix of the datasource settings
    #[arg(long, default_value = "db.datasource")]
    root: String,

    /// Key prefix of the connection manager settings (retries, fetch size)
    #[arg(long, default_value = "db.manager")]
    manager_root: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the transformed datasource configuration (password masked)
    Show,
    /// Check that the configured database exists on its server
    Validate,
    /// Create the configured database on its server when it is missing
    Create,
    /// Shut the in-process embedded database down
    Shutdown,
}

fn load_config(path: Option<&PathBuf>) -> Result<ConfigTree, DbInfraError> {
    let mut tree = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path).map_err(|e| {
                DbInfraError::config(format!("failed to read {}: {e}", path.display()))
            })?;
            ConfigTree::parse_properties(&text)?
        }
        None => ConfigTree::new(),
    };
    tree.overlay_env(ENV_PREFIX);
    Ok(tree)
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c_cancel.cancel();
        }
    });
    cancel
}

async fn run(args: Args) -> Result<(), DbInfraError> {
    let host = load_config(args.config.as_ref())?;
    let config = transform_datasource_config(&host, &args.root)?;
    let settings = BridgeSettings::from_config(&host.subtree(&args.manager_root))?;

    match args.command {
        Command::Show => {
            for (key, value) in config.iter() {
                let shown = if key == "password" { "***" } else { value };
                println!("{key}={shown}");
            }
        }
        Command::Validate => {
            let cancel = cancel_on_ctrl_c();
            let factory = DatasourceFactory::new(Arc::new(TcpPingFactory::default()));
            let exists =
                database_exists(&SeaBridge::new(), &factory, &config, &settings, &cancel).await?;
            println!(
                "database '{}' {}",
                config.database_name(),
                if exists { "exists" } else { "not found" }
            );
        }
        Command::Create => {
            let cancel = cancel_on_ctrl_c();
            let factory = DatasourceFactory::new(Arc::new(TcpPingFactory::default()));
            let created =
                create_database_if_missing(&SeaBridge::new(), &factory, &config, &settings, &cancel)
                    .await?;
            println!(
                "database '{}' {}",
                config.database_name(),
                if created { "created" } else { "left unchanged" }
            );
        }
        Command::Shutdown => {
            shutdown_embedded_database(&SeaBridge::new(), &config, settings.retry.retry_delay)
                .await;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .with_line_number(false)
        .with_file(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,datasource=info,datasource_infra=info".into()),
        )
        .init();

    let args = Args::parse();

    if let Err(e) = run(args).await {
        tracing::error!(code = e.code(), error = %e, "datasource command failed");
        std::process::exit(1);
    }
}
