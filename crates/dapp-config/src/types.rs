use dapp_relay::implementations::gelato::{
	DEFAULT_API_URL, DEFAULT_ERC2771_ADDRESS, DEFAULT_STATUS_URL,
};
use dapp_types::Address;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Top-level application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DappConfig {
	/// Wallet provider. Absent means no provider is available.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub wallet: Option<WalletConfig>,
	#[serde(default)]
	pub relay: RelayConfig,
	#[serde(default)]
	pub target: TargetConfig,
}

/// Selected wallet implementation plus one table per implementation.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WalletConfig {
	#[serde(rename = "type")]
	pub wallet_type: String,
	#[serde(flatten)]
	pub implementations: HashMap<String, toml::Value>,
}

impl WalletConfig {
	/// Table of the selected implementation, empty when not given.
	pub fn settings(&self) -> toml::Value {
		self.implementations
			.get(&self.wallet_type)
			.cloned()
			.unwrap_or_else(|| toml::Value::Table(toml::Table::new()))
	}

	pub(crate) fn set(&mut self, implementation: &str, key: &str, value: String) {
		let entry = self
			.implementations
			.entry(implementation.to_string())
			.or_insert_with(|| toml::Value::Table(toml::Table::new()));
		if let toml::Value::Table(table) = entry {
			table.insert(key.to_string(), toml::Value::String(value));
		}
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RelayConfig {
	#[serde(default = "default_api_url")]
	pub api_url: String,
	#[serde(default = "default_status_url")]
	pub status_url: String,
	/// Sponsor key; an empty key is sent unchanged and rejected by the relay.
	#[serde(default)]
	pub api_key: String,
	#[serde(default = "default_erc2771_address")]
	pub erc2771_address: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub timeout_secs: Option<u64>,
}

impl Default for RelayConfig {
	fn default() -> Self {
		Self {
			api_url: default_api_url(),
			status_url: default_status_url(),
			api_key: String::new(),
			erc2771_address: default_erc2771_address(),
			timeout_secs: None,
		}
	}
}

/// Contract and zero-argument method the dapp calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TargetConfig {
	#[serde(default = "default_target_address")]
	pub address: String,
	#[serde(default = "default_target_method")]
	pub method: String,
}

impl TargetConfig {
	pub fn address(&self) -> Result<Address, String> {
		self.address
			.parse()
			.map_err(|e| format!("Invalid target address '{}': {}", self.address, e))
	}
}

impl Default for TargetConfig {
	fn default() -> Self {
		Self {
			address: default_target_address(),
			method: default_target_method(),
		}
	}
}

fn default_api_url() -> String {
	DEFAULT_API_URL.to_string()
}

fn default_status_url() -> String {
	DEFAULT_STATUS_URL.to_string()
}

fn default_erc2771_address() -> String {
	DEFAULT_ERC2771_ADDRESS.to_checksum(None)
}

fn default_target_address() -> String {
	"0x00172f67db60E5fA346e599cdE675f0ca213b47b".to_string()
}

fn default_target_method() -> String {
	"increment".to_string()
}
