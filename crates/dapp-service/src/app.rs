//! Wiring of the connection controller and relay submitter from configuration.

use anyhow::{Context, Result};
use dapp_config::DappConfig;
use dapp_connection::{Connection, ConnectionController};
use dapp_relay::implementations::gelato::GelatoRelay;
use dapp_relay::{RelaySubmitter, RelayTarget};
use dapp_wallet::WalletInterface;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub struct App {
	config: DappConfig,
	controller: Arc<ConnectionController>,
	submitter: RelaySubmitter,
}

impl App {
	pub fn new(config: DappConfig) -> Result<Self> {
		let erc2771_address = config
			.relay
			.erc2771_address
			.parse()
			.context("Invalid relay erc2771_address")?;
		let timeout = Duration::from_secs(config.relay.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS));
		let relay = GelatoRelay::with_timeout(&config.relay.api_url, erc2771_address, timeout)
			.context("Failed to create relay client")?;

		let target = RelayTarget::new(
			config.target.address().map_err(anyhow::Error::msg)?,
			config.target.method.clone(),
		);

		let controller = Arc::new(ConnectionController::new());
		let submitter = RelaySubmitter::new(
			controller.clone(),
			Arc::new(relay),
			target,
			config.relay.api_key.clone(),
			config.relay.status_url.clone(),
		);

		Ok(Self {
			config,
			controller,
			submitter,
		})
	}

	pub fn controller(&self) -> &ConnectionController {
		&self.controller
	}

	pub fn submitter(&self) -> &RelaySubmitter {
		&self.submitter
	}

	/// Looks for the configured provider and probes it.
	pub async fn probe(&self) -> Result<Arc<Connection>> {
		let wallet = self.detect().await?;
		Ok(self.controller.probe(wallet).await)
	}

	async fn detect(&self) -> Result<Option<Arc<dyn WalletInterface>>> {
		let Some(wallet) = &self.config.wallet else {
			return Ok(None);
		};

		dapp_wallet::detect_wallet(&wallet.wallet_type, &wallet.settings())
			.await
			.context("Failed to set up wallet provider")
	}
}
