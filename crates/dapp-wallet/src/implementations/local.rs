//! Local key wallet for development and scripted use.
//!
//! Holds a private key in process and pairs it with a plain RPC endpoint for
//! network and read queries. Permission and account requests are granted
//! immediately since there is nobody to prompt.

use crate::{WalletError, WalletInterface};
use alloy::dyn_abi::TypedData;
use alloy::primitives::{Address, Bytes};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::{TransactionInput, TransactionRequest};
use alloy::signers::{local::PrivateKeySigner, Signer};
use async_trait::async_trait;
use dapp_types::{
	validate_http_url, validate_private_key, ChainIdentity, ConfigSchema, Field, FieldType,
	Schema,
};

/// Local wallet implementation using Alloy's signer.
pub struct LocalWallet {
	/// The underlying Alloy signer that handles cryptographic operations.
	signer: PrivateKeySigner,
	/// Read-only provider for network identity and calls.
	provider: DynProvider,
}

impl LocalWallet {
	/// Creates a LocalWallet from a hex-encoded private key (with or without
	/// 0x prefix) and the RPC URL used for reads.
	pub fn new(private_key_hex: &str, rpc_url: &str) -> Result<Self, WalletError> {
		let signer = private_key_hex
			.parse::<PrivateKeySigner>()
			.map_err(|e| WalletError::InvalidKey(format!("Invalid private key: {}", e)))?;

		let url = rpc_url
			.parse()
			.map_err(|e| WalletError::InvalidConfig(format!("Invalid RPC URL: {}", e)))?;
		let provider = ProviderBuilder::new().connect_http(url).erased();

		Ok(Self { signer, provider })
	}

	pub fn address(&self) -> Address {
		self.signer.address()
	}
}

/// Configuration schema for LocalWallet.
pub struct LocalWalletSchema;

impl ConfigSchema for LocalWalletSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), dapp_types::ValidationError> {
		let schema = Schema::new(
			vec![
				Field::new("private_key", FieldType::String).with_validator(validate_private_key),
				Field::new("rpc_url", FieldType::String).with_validator(validate_http_url),
			],
			vec![],
		);

		schema.validate(config)
	}
}

#[async_trait]
impl WalletInterface for LocalWallet {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(LocalWalletSchema)
	}

	async fn request_permissions(&self) -> Result<(), WalletError> {
		Ok(())
	}

	async fn request_accounts(&self) -> Result<Vec<Address>, WalletError> {
		Ok(vec![self.signer.address()])
	}

	async fn accounts(&self) -> Result<Vec<Address>, WalletError> {
		Ok(vec![self.signer.address()])
	}

	async fn network(&self) -> Result<ChainIdentity, WalletError> {
		let chain_id = self
			.provider
			.get_chain_id()
			.await
			.map_err(|e| WalletError::Rpc(format!("eth_chainId failed: {}", e)))?;
		Ok(ChainIdentity::from_id(chain_id))
	}

	async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, WalletError> {
		let tx = TransactionRequest::default()
			.to(to)
			.input(TransactionInput::new(data));
		self.provider
			.call(tx)
			.await
			.map_err(|e| WalletError::Rpc(format!("eth_call failed: {}", e)))
	}

	async fn sign_typed_data(
		&self,
		address: Address,
		payload: &TypedData,
	) -> Result<Bytes, WalletError> {
		if address != self.signer.address() {
			return Err(WalletError::Signing(format!(
				"Account {} is not managed by this wallet",
				address
			)));
		}

		let hash = payload
			.eip712_signing_hash()
			.map_err(|e| WalletError::Signing(format!("Failed to hash typed data: {}", e)))?;

		let signature = self
			.signer
			.sign_hash(&hash)
			.await
			.map_err(|e| WalletError::Signing(format!("Failed to sign typed data: {}", e)))?;

		Ok(Bytes::copy_from_slice(&signature.as_bytes()))
	}
}

/// Creates a local wallet from its TOML table.
///
/// Required configuration parameters:
/// - `private_key`: hex-encoded signing key
/// - `rpc_url`: HTTP RPC endpoint used for network and read queries
pub fn create_local_wallet(config: &toml::Value) -> Result<LocalWallet, WalletError> {
	let private_key = config
		.get("private_key")
		.and_then(|v| v.as_str())
		.ok_or_else(|| WalletError::InvalidConfig("private_key is required".to_string()))?;

	let rpc_url = config
		.get("rpc_url")
		.and_then(|v| v.as_str())
		.ok_or_else(|| WalletError::InvalidConfig("rpc_url is required".to_string()))?;

	LocalWallet::new(private_key, rpc_url)
}
