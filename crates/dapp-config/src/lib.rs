//! Configuration loading for the gasless dapp.

use dapp_relay::implementations::gelato::GelatoRelaySchema;
use dapp_types::{validate_address, validate_identifier, ConfigSchema, Field, FieldType, Schema};
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

mod types;

pub use types::*;

#[derive(Error, Debug)]
pub enum ConfigError {
	#[error("File not found: {0}")]
	FileNotFound(String),

	#[error("Parse error: {0}")]
	ParseError(String),

	#[error("Validation error: {0}")]
	ValidationError(String),

	#[error("Environment variable not found: {0}")]
	EnvVarNotFound(String),

	#[error("IO error: {0}")]
	IoError(#[from] std::io::Error),
}

/// Configuration loader with environment variable substitution
pub struct ConfigLoader {
	file_path: Option<String>,
	env_prefix: String,
}

impl Default for ConfigLoader {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigLoader {
	pub fn new() -> Self {
		Self {
			file_path: None,
			env_prefix: "DAPP_".to_string(),
		}
	}

	pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
		self.file_path = Some(path.as_ref().to_string_lossy().to_string());
		self
	}

	pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.env_prefix = prefix.into();
		self
	}

	pub async fn load(&self) -> Result<DappConfig, ConfigError> {
		let Some(file_path) = &self.file_path else {
			return Err(ConfigError::FileNotFound(
				"No configuration file specified".to_string(),
			));
		};

		if !Path::new(file_path).exists() {
			return Err(ConfigError::FileNotFound(file_path.clone()));
		}

		let content = tokio::fs::read_to_string(file_path).await?;
		let mut config = self.parse(&content)?;

		self.apply_env_overrides(&mut config);
		validate_config(&config)?;

		Ok(config)
	}

	/// Parses configuration text after `${VAR}` substitution.
	pub fn parse(&self, content: &str) -> Result<DappConfig, ConfigError> {
		let substituted = substitute_env_vars(content)?;
		toml::from_str(&substituted).map_err(|e| ConfigError::ParseError(e.to_string()))
	}

	fn apply_env_overrides(&self, config: &mut DappConfig) {
		if let Ok(api_key) = env::var(format!("{}RELAY_API_KEY", self.env_prefix)) {
			debug!("Overriding relay API key from environment");
			config.relay.api_key = api_key;
		}

		if let Ok(endpoint) = env::var(format!("{}WALLET_ENDPOINT", self.env_prefix)) {
			let wallet = config.wallet.get_or_insert_with(|| WalletConfig {
				wallet_type: "eip1193".to_string(),
				implementations: Default::default(),
			});
			if wallet.wallet_type == "eip1193" {
				debug!("Overriding wallet endpoint from environment");
				wallet.set("eip1193", "endpoint", endpoint);
			} else {
				warn!(
					wallet_type = %wallet.wallet_type,
					"{}WALLET_ENDPOINT only applies to eip1193 wallets, ignoring",
					self.env_prefix
				);
			}
		}
	}
}

fn substitute_env_vars(content: &str) -> Result<String, ConfigError> {
	let mut result = content.to_string();

	let re = regex::Regex::new(r"\$\{([^}]+)\}")
		.map_err(|e| ConfigError::ParseError(e.to_string()))?;

	for cap in re.captures_iter(content) {
		let full_match = &cap[0];
		let var_name = &cap[1];

		let env_value =
			env::var(var_name).map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;

		result = result.replace(full_match, &env_value);
	}

	Ok(result)
}

/// Checks every section against the schema of the implementation it selects.
pub fn validate_config(config: &DappConfig) -> Result<(), ConfigError> {
	if let Some(wallet) = &config.wallet {
		dapp_wallet::wallet_schema(&wallet.wallet_type)
			.map_err(|e| ConfigError::ValidationError(e.to_string()))?
			.validate(&wallet.settings())
			.map_err(|e| {
				ConfigError::ValidationError(format!("wallet.{}: {}", wallet.wallet_type, e))
			})?;
	}

	let relay = toml::Value::try_from(&config.relay)
		.map_err(|e| ConfigError::ParseError(e.to_string()))?;
	GelatoRelaySchema
		.validate(&relay)
		.map_err(|e| ConfigError::ValidationError(format!("relay: {}", e)))?;

	let target = toml::Value::try_from(&config.target)
		.map_err(|e| ConfigError::ParseError(e.to_string()))?;
	Schema::new(
		vec![
			Field::new("address", FieldType::String).with_validator(validate_address),
			Field::new("method", FieldType::String).with_validator(validate_identifier),
		],
		vec![],
	)
	.validate(&target)
	.map_err(|e| ConfigError::ValidationError(format!("target: {}", e)))?;

	Ok(())
}
