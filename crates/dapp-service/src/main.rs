use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dapp_config::{ConfigLoader, DappConfig};
use dapp_connection::Connection;
use dapp_types::RelayTaskHandle;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod app;
mod clipboard;

use app::App;

#[derive(Parser)]
#[command(name = "gasless-dapp")]
#[command(about = "Gasless counter dapp client", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
	#[command(subcommand)]
	command: Option<Commands>,

	#[arg(short, long, value_name = "FILE", default_value = "config/local.toml")]
	config: PathBuf,

	#[arg(long, env = "DAPP_LOG_LEVEL", default_value = "info")]
	log_level: String,
}

#[derive(Subcommand)]
enum Commands {
	/// Probe the wallet and show the connection
	Status,
	/// Ask the wallet for account access, then probe again
	Connect,
	/// Ask the wallet to re-authorize accounts, then probe again
	Disconnect,
	/// Submit a sponsored call to the target contract
	Relay {
		/// Copy the task status link to the clipboard
		#[arg(long)]
		copy: bool,
	},
	/// Look up the status of a relay task
	Task {
		/// Task identifier returned by `relay`
		task_id: String,
	},
	/// Validate the configuration file
	Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();

	setup_tracing(&cli.log_level)?;

	match cli.command {
		Some(Commands::Status) | None => status(&cli.config).await,
		Some(Commands::Connect) => connect(&cli.config).await,
		Some(Commands::Disconnect) => disconnect(&cli.config).await,
		Some(Commands::Relay { copy }) => relay(&cli.config, copy).await,
		Some(Commands::Task { ref task_id }) => task(&cli.config, task_id).await,
		Some(Commands::Validate) => validate_config(&cli.config).await,
	}
}

async fn load_config(path: &Path) -> Result<DappConfig> {
	info!("Loading configuration from: {:?}", path);
	ConfigLoader::new()
		.with_file(path)
		.load()
		.await
		.context("Failed to load configuration")
}

async fn load_app(path: &Path) -> Result<App> {
	App::new(load_config(path).await?)
}

async fn status(path: &Path) -> Result<()> {
	let app = load_app(path).await?;
	let connection = app.probe().await?;
	print_connection(&connection);
	Ok(())
}

async fn connect(path: &Path) -> Result<()> {
	let app = load_app(path).await?;
	app.probe().await?;
	let connection = app.controller().connect().await;
	print_connection(&connection);
	Ok(())
}

async fn disconnect(path: &Path) -> Result<()> {
	let app = load_app(path).await?;
	app.probe().await?;
	app.controller().request_disconnect().await;
	print_connection(&app.controller().state());

	let connection = app.controller().refresh().await;
	print_connection(&connection);
	Ok(())
}

async fn relay(path: &Path, copy: bool) -> Result<()> {
	let app = load_app(path).await?;
	let connection = app.probe().await?;
	print_connection(&connection);

	let task = app
		.submitter()
		.submit()
		.await
		.context("Failed to submit sponsored call")?;
	let url = app.submitter().status_url(&task);

	println!("Task: {}", task);
	if copy {
		clipboard::copy(&url).context("Failed to copy status link")?;
	} else {
		println!("{}", url);
	}
	Ok(())
}

async fn task(path: &Path, task_id: &str) -> Result<()> {
	let app = load_app(path).await?;
	let status = app
		.submitter()
		.task_status(&RelayTaskHandle::new(task_id))
		.await
		.context("Failed to look up task status")?;

	println!("Task:  {}", status.task_id);
	println!("Chain: {}", status.chain_id);
	println!("State: {:?}", status.task_state);
	if let Some(hash) = &status.transaction_hash {
		println!("Tx:    {}", hash);
	}
	if let Some(message) = &status.last_check_message {
		println!("Note:  {}", message);
	}
	Ok(())
}

async fn validate_config(path: &Path) -> Result<()> {
	let config = load_config(path).await?;

	info!("Configuration is valid");
	match &config.wallet {
		Some(wallet) => info!("Wallet: {}", wallet.wallet_type),
		None => info!("Wallet: none configured"),
	}
	info!("Relay: {}", config.relay.api_url);
	info!(
		"Target: {}.{}()",
		config.target.address, config.target.method
	);
	if config.relay.api_key.is_empty() {
		info!("Relay API key is empty, sponsored calls will be rejected");
	}

	Ok(())
}

fn print_connection(connection: &Connection) {
	println!("Status:  {}", connection.status);
	if connection.chain.is_set() {
		println!("Network: {}", connection.chain);
	}
	if let Some(address) = connection.signer_address() {
		println!("Signer:  {}", address);
	}
}

fn setup_tracing(log_level: &str) -> Result<()> {
	let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

	tracing_subscriber::registry()
		.with(env_filter)
		.with(tracing_subscriber::fmt::layer())
		.init();

	Ok(())
}
