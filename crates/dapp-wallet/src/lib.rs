//! Wallet provider capability for the gasless dapp client.
//!
//! The client never owns keys directly. Everything it needs from a wallet goes
//! through [`WalletInterface`]: asking for account permission, listing
//! authorized accounts, reading the network, read-only contract calls and
//! EIP-712 signatures. Concrete providers live in [`implementations`].

use alloy::dyn_abi::TypedData;
use alloy::primitives::{Address, Bytes};
use async_trait::async_trait;
use dapp_types::{ChainIdentity, ConfigSchema};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

pub mod implementations {
	pub mod eip1193;
	pub mod local;
}

/// JSON-RPC error code a wallet returns when the user rejects a request.
pub const USER_REJECTED_CODE: i64 = 4001;

#[derive(Debug, Error)]
pub enum WalletError {
	#[error("Wallet provider unavailable: {0}")]
	Unavailable(String),
	#[error("Request rejected by user: {0}")]
	Rejected(String),
	#[error("Provider error: {0}")]
	Rpc(String),
	#[error("Signing failed: {0}")]
	Signing(String),
	#[error("Invalid key: {0}")]
	InvalidKey(String),
	#[error("Invalid configuration: {0}")]
	InvalidConfig(String),
}

/// Operations the client needs from an injected-style wallet provider.
#[async_trait]
pub trait WalletInterface: Send + Sync {
	/// Schema of the TOML table this provider is configured from.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Asks the wallet to grant account access. A successful return does not
	/// mean access was granted; only a later [`accounts`](Self::accounts) call tells.
	async fn request_permissions(&self) -> Result<(), WalletError>;

	/// Asks the wallet to expose its accounts, prompting the user if needed.
	async fn request_accounts(&self) -> Result<Vec<Address>, WalletError>;

	/// Accounts currently authorized for this client. May be empty.
	async fn accounts(&self) -> Result<Vec<Address>, WalletError>;

	/// Network the wallet is attached to.
	async fn network(&self) -> Result<ChainIdentity, WalletError>;

	/// Read-only call against the latest block.
	async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, WalletError>;

	/// Signs an EIP-712 payload with `address`, returning the 65-byte signature.
	async fn sign_typed_data(
		&self,
		address: Address,
		payload: &TypedData,
	) -> Result<Bytes, WalletError>;
}

/// Signing capability bound to one wallet account.
///
/// Handed out by the connection controller after a successful probe. It is
/// only meaningful while the controller still reports a successful connection.
#[derive(Clone)]
pub struct SignerHandle {
	address: Address,
	wallet: Arc<dyn WalletInterface>,
}

impl SignerHandle {
	pub fn new(address: Address, wallet: Arc<dyn WalletInterface>) -> Self {
		Self { address, wallet }
	}

	pub fn address(&self) -> Address {
		self.address
	}

	pub async fn sign_typed_data(&self, payload: &TypedData) -> Result<Bytes, WalletError> {
		self.wallet.sign_typed_data(self.address, payload).await
	}

	pub async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, WalletError> {
		self.wallet.call(to, data).await
	}
}

impl fmt::Debug for SignerHandle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SignerHandle")
			.field("address", &self.address)
			.finish_non_exhaustive()
	}
}

/// Wallet implementations selectable from configuration.
pub const WALLET_TYPES: &[&str] = &["eip1193", "local"];

/// Returns the config schema of the named wallet implementation.
pub fn wallet_schema(wallet_type: &str) -> Result<Box<dyn ConfigSchema>, WalletError> {
	match wallet_type {
		"eip1193" => Ok(Box::new(implementations::eip1193::Eip1193WalletSchema)),
		"local" => Ok(Box::new(implementations::local::LocalWalletSchema)),
		other => Err(WalletError::InvalidConfig(format!(
			"Unknown wallet type '{}', expected one of {:?}",
			other, WALLET_TYPES
		))),
	}
}

/// Looks for the configured wallet provider.
///
/// Returns `Ok(None)` when the provider cannot be reached, which the
/// connection controller reports as a missing wallet. Configuration errors
/// are returned as errors.
pub async fn detect_wallet(
	wallet_type: &str,
	config: &toml::Value,
) -> Result<Option<Arc<dyn WalletInterface>>, WalletError> {
	wallet_schema(wallet_type)?
		.validate(config)
		.map_err(|e| WalletError::InvalidConfig(e.to_string()))?;

	match wallet_type {
		"eip1193" => {
			let wallet = implementations::eip1193::create_eip1193_wallet(config)?;
			match wallet.detect().await {
				Ok(chain_id) => {
					debug!(
						chain_id,
						endpoint = wallet.endpoint(),
						"Detected EIP-1193 wallet provider"
					);
					Ok(Some(Arc::new(wallet)))
				}
				Err(e) => {
					debug!("No wallet provider at configured endpoint: {}", e);
					Ok(None)
				}
			}
		}
		_ => {
			let wallet = implementations::local::create_local_wallet(config)?;
			Ok(Some(Arc::new(wallet)))
		}
	}
}
