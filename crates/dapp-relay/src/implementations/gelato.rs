//! Gelato relay client for ERC-2771 sponsored calls.
//!
//! A sponsored call is authorized by the user through an EIP-712 signature
//! over the call, a per-user nonce kept by the Gelato ERC-2771 relay contract
//! and a deadline. The signed call is posted to the relay API together with
//! the sponsor API key; gas is paid from the sponsor's 1Balance account.

use crate::{RelayError, RelayInterface};
use alloy::dyn_abi::TypedData;
use alloy::primitives::{address, hex, Address, U256};
use alloy::sol;
use alloy::sol_types::{eip712_domain, SolCall};
use async_trait::async_trait;
use dapp_types::{
	validate_address, validate_http_url, ConfigSchema, Field, FieldType, RelayRequest,
	RelayTaskHandle, Schema, TaskStatus,
};
use dapp_wallet::SignerHandle;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Relay API base URL.
pub const DEFAULT_API_URL: &str = "https://api.gelato.digital";
/// Base of the human facing task status URL.
pub const DEFAULT_STATUS_URL: &str = "https://relay.gelato.digital";
/// GelatoRelay1BalanceERC2771 deployment shared by most networks.
pub const DEFAULT_ERC2771_ADDRESS: Address = address!("d8253782c45a12053594b9deB72d8e8aB2Fca54c");
/// How long a signed call stays valid.
pub const DEFAULT_DEADLINE_GAP: Duration = Duration::from_secs(24 * 60 * 60);

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const EIP712_DOMAIN_NAME: &str = "GelatoRelay1BalanceERC2771";
const EIP712_DOMAIN_VERSION: &str = "1";

sol! {
	/// Nonce bookkeeping of the ERC-2771 relay contract.
	interface IGelatoRelayERC2771 {
		function userNonce(address account) external view returns (uint256);
	}

	/// Message the user signs to authorize a sponsored call.
	#[derive(Serialize)]
	struct SponsoredCallERC2771 {
		uint256 chainId;
		address target;
		bytes data;
		address user;
		uint256 userNonce;
		uint256 userDeadline;
	}
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SponsoredCallBody<'a> {
	chain_id: String,
	target: String,
	data: String,
	user: String,
	user_nonce: String,
	user_deadline: u64,
	user_signature: String,
	sponsor_api_key: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskResponse {
	task_id: String,
}

#[derive(Debug, Deserialize)]
struct TaskStatusResponse {
	task: TaskStatus,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
	message: String,
}

/// HTTP client for the Gelato relay API.
pub struct GelatoRelay {
	client: reqwest::Client,
	api_url: String,
	erc2771_address: Address,
	deadline_gap: Duration,
}

impl GelatoRelay {
	pub fn new(api_url: &str, erc2771_address: Address) -> Result<Self, RelayError> {
		Self::with_timeout(api_url, erc2771_address, DEFAULT_TIMEOUT)
	}

	pub fn with_timeout(
		api_url: &str,
		erc2771_address: Address,
		timeout: Duration,
	) -> Result<Self, RelayError> {
		let client = reqwest::Client::builder()
			.timeout(timeout)
			.build()
			.map_err(|e| RelayError::Network(format!("Failed to build HTTP client: {}", e)))?;

		Ok(Self {
			client,
			api_url: api_url.trim_end_matches('/').to_string(),
			erc2771_address,
			deadline_gap: DEFAULT_DEADLINE_GAP,
		})
	}

	/// Reads the user's current nonce from the relay contract.
	async fn user_nonce(&self, signer: &SignerHandle) -> Result<U256, RelayError> {
		let call = IGelatoRelayERC2771::userNonceCall {
			account: signer.address(),
		};
		let raw = signer
			.call(self.erc2771_address, call.abi_encode().into())
			.await
			.map_err(|e| RelayError::Network(format!("Failed to read user nonce: {}", e)))?;

		IGelatoRelayERC2771::userNonceCall::abi_decode_returns(&raw)
			.map_err(|e| RelayError::InvalidResponse(format!("Malformed user nonce: {}", e)))
	}

	fn user_deadline(&self) -> Result<u64, RelayError> {
		deadline_after(SystemTime::now(), self.deadline_gap)
	}

	/// EIP-712 payload authorizing `request` with the given nonce and deadline.
	pub fn typed_data(&self, request: &RelayRequest, nonce: U256, deadline: u64) -> TypedData {
		let domain = eip712_domain! {
			name: EIP712_DOMAIN_NAME,
			version: EIP712_DOMAIN_VERSION,
			chain_id: request.chain_id,
			verifying_contract: self.erc2771_address,
		};

		let message = SponsoredCallERC2771 {
			chainId: U256::from(request.chain_id),
			target: request.target,
			data: request.data.clone(),
			user: request.user,
			userNonce: nonce,
			userDeadline: U256::from(deadline),
		};

		TypedData::from_struct(&message, Some(domain))
	}

	async fn rejection(response: reqwest::Response) -> RelayError {
		let status = response.status().as_u16();
		let body = response.text().await.unwrap_or_default();
		let message = serde_json::from_str::<ErrorResponse>(&body)
			.map(|e| e.message)
			.unwrap_or(body);
		RelayError::Rejected { status, message }
	}
}

/// Unix timestamp `gap` after `now`.
fn deadline_after(now: SystemTime, gap: Duration) -> Result<u64, RelayError> {
	now.duration_since(UNIX_EPOCH)
		.map(|since_epoch| (since_epoch + gap).as_secs())
		.map_err(|e| RelayError::Encoding(format!("System clock is before the unix epoch: {}", e)))
}

/// Configuration schema for the Gelato relay.
pub struct GelatoRelaySchema;

impl ConfigSchema for GelatoRelaySchema {
	fn validate(&self, config: &toml::Value) -> Result<(), dapp_types::ValidationError> {
		let schema = Schema::new(
			vec![Field::new("api_url", FieldType::String).with_validator(validate_http_url)],
			vec![
				Field::new("status_url", FieldType::String).with_validator(validate_http_url),
				Field::new("api_key", FieldType::String),
				Field::new("erc2771_address", FieldType::String).with_validator(validate_address),
				Field::new(
					"timeout_secs",
					FieldType::Integer {
						min: Some(1),
						max: Some(600),
					},
				),
			],
		);

		schema.validate(config)
	}
}

#[async_trait]
impl RelayInterface for GelatoRelay {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(GelatoRelaySchema)
	}

	async fn sponsored_call_erc2771(
		&self,
		request: &RelayRequest,
		signer: &SignerHandle,
		api_key: &str,
	) -> Result<RelayTaskHandle, RelayError> {
		let nonce = self.user_nonce(signer).await?;
		let deadline = self.user_deadline()?;
		debug!(%nonce, deadline, "Signing sponsored call");

		let payload = self.typed_data(request, nonce, deadline);
		let signature = signer
			.sign_typed_data(&payload)
			.await
			.map_err(|e| RelayError::Signing(e.to_string()))?;

		let body = SponsoredCallBody {
			chain_id: request.chain_id.to_string(),
			target: request.target.to_checksum(None),
			data: hex::encode_prefixed(&request.data),
			user: request.user.to_checksum(None),
			user_nonce: nonce.to_string(),
			user_deadline: deadline,
			user_signature: hex::encode_prefixed(&signature),
			sponsor_api_key: api_key,
		};

		let url = format!("{}/relays/v2/sponsored-call-erc2771", self.api_url);
		let response = self
			.client
			.post(&url)
			.json(&body)
			.send()
			.await
			.map_err(|e| RelayError::Network(format!("Relay request failed: {}", e)))?;

		if !response.status().is_success() {
			return Err(Self::rejection(response).await);
		}

		let task: TaskResponse = response
			.json()
			.await
			.map_err(|e| RelayError::InvalidResponse(format!("Failed to parse task: {}", e)))?;

		Ok(RelayTaskHandle::new(task.task_id))
	}

	async fn task_status(&self, task: &RelayTaskHandle) -> Result<TaskStatus, RelayError> {
		let url = format!("{}/tasks/status/{}", self.api_url, task.task_id);
		let response = self
			.client
			.get(&url)
			.send()
			.await
			.map_err(|e| RelayError::Network(format!("Task status request failed: {}", e)))?;

		if !response.status().is_success() {
			return Err(Self::rejection(response).await);
		}

		let status: TaskStatusResponse = response.json().await.map_err(|e| {
			RelayError::InvalidResponse(format!("Failed to parse task status: {}", e))
		})?;

		Ok(status.task)
	}
}
