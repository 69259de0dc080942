//! Injected-provider wallet reached over JSON-RPC.
//!
//! Desktop wallets and browser bridges expose the EIP-1193 request methods
//! (`wallet_requestPermissions`, `eth_requestAccounts`, `eth_accounts`, ...)
//! on a local HTTP endpoint. This implementation forwards every
//! [`WalletInterface`] operation to such an endpoint through an Alloy provider.

use crate::{WalletError, WalletInterface, USER_REJECTED_CODE};
use alloy::dyn_abi::TypedData;
use alloy::primitives::{Address, Bytes};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::{TransactionInput, TransactionRequest};
use alloy::transports::TransportError;
use async_trait::async_trait;
use dapp_types::{validate_http_url, ChainIdentity, ConfigSchema, Field, FieldType, Schema};
use serde_json::{json, Value};
use tracing::debug;

/// Wallet provider speaking the injected-provider convention over HTTP.
pub struct Eip1193Wallet {
	provider: DynProvider,
	endpoint: String,
}

impl Eip1193Wallet {
	/// Creates a wallet bound to `endpoint`. No request is made until first use.
	pub fn new(endpoint: &str) -> Result<Self, WalletError> {
		let url = endpoint
			.parse()
			.map_err(|e| WalletError::InvalidConfig(format!("Invalid endpoint URL: {}", e)))?;

		let provider = ProviderBuilder::new().connect_http(url).erased();

		Ok(Self {
			provider,
			endpoint: endpoint.to_string(),
		})
	}

	pub fn endpoint(&self) -> &str {
		&self.endpoint
	}

	/// Checks that something answers on the endpoint, returning its chain id.
	pub async fn detect(&self) -> Result<u64, WalletError> {
		self.provider
			.get_chain_id()
			.await
			.map_err(|e| WalletError::Unavailable(format!("{}: {}", self.endpoint, e)))
	}
}

/// Converts a transport error, singling out user rejections.
fn map_rpc_error(method: &str, error: TransportError) -> WalletError {
	if let Some(payload) = error.as_error_resp() {
		if payload.code == USER_REJECTED_CODE {
			return WalletError::Rejected(format!("{}: {}", method, payload.message));
		}
	}
	WalletError::Rpc(format!("{} failed: {}", method, error))
}

/// Configuration schema for the injected-provider wallet.
pub struct Eip1193WalletSchema;

impl ConfigSchema for Eip1193WalletSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), dapp_types::ValidationError> {
		let schema = Schema::new(
			vec![Field::new("endpoint", FieldType::String).with_validator(validate_http_url)],
			vec![],
		);

		schema.validate(config)
	}
}

#[async_trait]
impl WalletInterface for Eip1193Wallet {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(Eip1193WalletSchema)
	}

	async fn request_permissions(&self) -> Result<(), WalletError> {
		let method = "wallet_requestPermissions";
		debug!(endpoint = %self.endpoint, "{}", method);
		self.provider
			.raw_request::<_, Value>(method.into(), [json!({ "eth_accounts": {} })])
			.await
			.map_err(|e| map_rpc_error(method, e))?;
		Ok(())
	}

	async fn request_accounts(&self) -> Result<Vec<Address>, WalletError> {
		let method = "eth_requestAccounts";
		debug!(endpoint = %self.endpoint, "{}", method);
		self.provider
			.raw_request::<_, Vec<Address>>(method.into(), Vec::<Value>::new())
			.await
			.map_err(|e| map_rpc_error(method, e))
	}

	async fn accounts(&self) -> Result<Vec<Address>, WalletError> {
		self.provider
			.get_accounts()
			.await
			.map_err(|e| map_rpc_error("eth_accounts", e))
	}

	async fn network(&self) -> Result<ChainIdentity, WalletError> {
		let chain_id = self
			.provider
			.get_chain_id()
			.await
			.map_err(|e| map_rpc_error("eth_chainId", e))?;
		Ok(ChainIdentity::from_id(chain_id))
	}

	async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, WalletError> {
		let tx = TransactionRequest::default()
			.to(to)
			.input(TransactionInput::new(data));
		self.provider
			.call(tx)
			.await
			.map_err(|e| map_rpc_error("eth_call", e))
	}

	async fn sign_typed_data(
		&self,
		address: Address,
		payload: &TypedData,
	) -> Result<Bytes, WalletError> {
		let method = "eth_signTypedData_v4";
		let encoded = serde_json::to_string(payload)
			.map_err(|e| WalletError::Signing(format!("Failed to encode typed data: {}", e)))?;

		self.provider
			.raw_request::<_, Bytes>(method.into(), (address, encoded))
			.await
			.map_err(|e| match map_rpc_error(method, e) {
				WalletError::Rpc(message) => WalletError::Signing(message),
				other => other,
			})
	}
}

/// Creates an injected-provider wallet from its TOML table.
///
/// Required configuration parameters:
/// - `endpoint`: HTTP URL the wallet answers JSON-RPC requests on
pub fn create_eip1193_wallet(config: &toml::Value) -> Result<Eip1193Wallet, WalletError> {
	let endpoint = config
		.get("endpoint")
		.and_then(|v| v.as_str())
		.ok_or_else(|| WalletError::InvalidConfig("endpoint is required".to_string()))?;

	Eip1193Wallet::new(endpoint)
}
