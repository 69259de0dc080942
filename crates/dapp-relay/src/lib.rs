//! Sponsored contract calls through a gas relay.
//!
//! The [`RelaySubmitter`] packages one call to a fixed contract method as a
//! [`RelayRequest`] for the currently connected signer and hands it to a
//! [`RelayInterface`] implementation, which signs and dispatches it. The user
//! never pays gas; the relay returns a task identifier for status lookups.

use alloy::dyn_abi::JsonAbiExt;
use alloy::json_abi::Function;
use alloy::primitives::{hex, Address, Bytes};
use async_trait::async_trait;
use dapp_connection::ConnectionController;
use dapp_types::{ConfigSchema, ConnectionState, RelayRequest, RelayTaskHandle, TaskStatus};
use dapp_wallet::SignerHandle;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

pub mod implementations {
	pub mod gelato;
}

#[derive(Debug, Error)]
pub enum RelayError {
	#[error("Wallet is not connected")]
	NotConnected,
	#[error("Failed to encode call: {0}")]
	Encoding(String),
	#[error("Signing failed: {0}")]
	Signing(String),
	#[error("Network error: {0}")]
	Network(String),
	#[error("Relay rejected request ({status}): {message}")]
	Rejected { status: u16, message: String },
	#[error("Invalid relay response: {0}")]
	InvalidResponse(String),
}

/// A relay network able to execute sponsored calls.
#[async_trait]
pub trait RelayInterface: Send + Sync {
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Submits `request` as an ERC-2771 sponsored call made by `signer`.
	///
	/// `signer` doubles as the read capability over the wallet provider the
	/// relay client may need (nonces, validation). An empty `api_key` is sent
	/// as is; relays are expected to reject it.
	async fn sponsored_call_erc2771(
		&self,
		request: &RelayRequest,
		signer: &SignerHandle,
		api_key: &str,
	) -> Result<RelayTaskHandle, RelayError>;

	/// Looks up the execution status of a submitted task.
	async fn task_status(&self, task: &RelayTaskHandle) -> Result<TaskStatus, RelayError>;
}

/// The fixed contract method every submission calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayTarget {
	pub address: Address,
	/// Name of a zero-argument method, e.g. `increment`.
	pub method: String,
}

impl RelayTarget {
	pub fn new(address: Address, method: impl Into<String>) -> Self {
		Self {
			address,
			method: method.into(),
		}
	}

	/// ABI-encodes the zero-argument call, which is just its 4-byte selector.
	pub fn encode_call(&self) -> Result<Bytes, RelayError> {
		let function = Function::parse(&format!("function {}()", self.method))
			.map_err(|e| RelayError::Encoding(format!("Invalid method '{}': {}", self.method, e)))?;

		let data = function
			.abi_encode_input(&[])
			.map_err(|e| RelayError::Encoding(e.to_string()))?;

		Ok(Bytes::from(data))
	}
}

/// Builds and dispatches sponsored calls for the connected signer.
pub struct RelaySubmitter {
	controller: Arc<ConnectionController>,
	relay: Arc<dyn RelayInterface>,
	target: RelayTarget,
	api_key: String,
	status_base: String,
}

impl RelaySubmitter {
	pub fn new(
		controller: Arc<ConnectionController>,
		relay: Arc<dyn RelayInterface>,
		target: RelayTarget,
		api_key: impl Into<String>,
		status_base: impl Into<String>,
	) -> Self {
		Self {
			controller,
			relay,
			target,
			api_key: api_key.into(),
			status_base: status_base.into(),
		}
	}

	pub fn target(&self) -> &RelayTarget {
		&self.target
	}

	/// Assembles the request for a call made by `user` on `chain_id`.
	pub fn build_request(&self, chain_id: u64, user: Address) -> Result<RelayRequest, RelayError> {
		Ok(RelayRequest {
			chain_id,
			target: self.target.address,
			data: self.target.encode_call()?,
			user,
		})
	}

	/// Submits one sponsored call for the connected signer.
	///
	/// The connection is read right here, never cached: when it is not in the
	/// success state this fails with [`RelayError::NotConnected`] before the
	/// relay is contacted. Every other failure is returned unchanged and
	/// leaves the connection untouched. Each call creates a new relay task.
	pub async fn submit(&self) -> Result<RelayTaskHandle, RelayError> {
		let connection = self.controller.state();
		let signer = match (&connection.status.state, &connection.signer) {
			(ConnectionState::Success, Some(signer)) => signer.clone(),
			_ => return Err(RelayError::NotConnected),
		};

		let request = self.build_request(connection.chain.id, signer.address())?;
		info!(
			chain_id = request.chain_id,
			target = %request.target,
			user = %request.user,
			data = %hex::encode_prefixed(&request.data),
			"Submitting sponsored call"
		);

		let task = self
			.relay
			.sponsored_call_erc2771(&request, &signer, &self.api_key)
			.await?;

		info!("{}", self.status_url(&task));
		Ok(task)
	}

	/// Tracking URL for `task`.
	pub fn status_url(&self, task: &RelayTaskHandle) -> String {
		task.status_url(&self.status_base)
	}

	pub async fn task_status(&self, task: &RelayTaskHandle) -> Result<TaskStatus, RelayError> {
		self.relay.task_status(task).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy::dyn_abi::TypedData;
	use alloy::primitives::address;
	use alloy::sol;
	use alloy::sol_types::SolCall;
	use dapp_types::{ChainIdentity, TaskState, ValidationError};
	use dapp_wallet::{WalletError, WalletInterface};
	use std::sync::Mutex;

	const COUNTER: Address = address!("00172f67db60E5fA346e599cdE675f0ca213b47b");
	const USER: Address = address!("00000000000000000000000000000000000a11ce");

	sol! {
		interface ICounter {
			function increment() external;
		}
	}

	struct NoSchema;

	impl ConfigSchema for NoSchema {
		fn validate(&self, _config: &toml::Value) -> Result<(), ValidationError> {
			Ok(())
		}
	}

	struct FakeWallet {
		chain: ChainIdentity,
		accounts: Vec<Address>,
	}

	#[async_trait]
	impl WalletInterface for FakeWallet {
		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			Box::new(NoSchema)
		}

		async fn request_permissions(&self) -> Result<(), WalletError> {
			Ok(())
		}

		async fn request_accounts(&self) -> Result<Vec<Address>, WalletError> {
			Ok(self.accounts.clone())
		}

		async fn accounts(&self) -> Result<Vec<Address>, WalletError> {
			Ok(self.accounts.clone())
		}

		async fn network(&self) -> Result<ChainIdentity, WalletError> {
			Ok(self.chain.clone())
		}

		async fn call(&self, _to: Address, _data: Bytes) -> Result<Bytes, WalletError> {
			Ok(Bytes::new())
		}

		async fn sign_typed_data(
			&self,
			_address: Address,
			_payload: &TypedData,
		) -> Result<Bytes, WalletError> {
			Ok(Bytes::from(vec![0u8; 65]))
		}
	}

	/// Relay double recording what it was asked to submit.
	#[derive(Default)]
	struct FakeRelay {
		submitted: Mutex<Vec<(RelayRequest, Address, String)>>,
		reject_empty_key: bool,
	}

	#[async_trait]
	impl RelayInterface for FakeRelay {
		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			Box::new(NoSchema)
		}

		async fn sponsored_call_erc2771(
			&self,
			request: &RelayRequest,
			signer: &SignerHandle,
			api_key: &str,
		) -> Result<RelayTaskHandle, RelayError> {
			self.submitted.lock().unwrap().push((
				request.clone(),
				signer.address(),
				api_key.to_string(),
			));
			if self.reject_empty_key && api_key.is_empty() {
				return Err(RelayError::Rejected {
					status: 401,
					message: "Invalid sponsorApiKey".to_string(),
				});
			}
			let count = self.submitted.lock().unwrap().len();
			Ok(RelayTaskHandle::new(format!("0xtask{}", count)))
		}

		async fn task_status(&self, task: &RelayTaskHandle) -> Result<TaskStatus, RelayError> {
			Ok(TaskStatus {
				task_id: task.task_id.clone(),
				chain_id: 137,
				task_state: TaskState::ExecSuccess,
				transaction_hash: None,
				block_number: None,
				last_check_message: None,
			})
		}
	}

	async fn connected_controller(accounts: Vec<Address>) -> Arc<ConnectionController> {
		let controller = Arc::new(ConnectionController::new());
		let wallet = Arc::new(FakeWallet {
			chain: ChainIdentity::new("polygon", 137),
			accounts,
		});
		controller.probe(Some(wallet)).await;
		controller
	}

	fn submitter(
		controller: Arc<ConnectionController>,
		relay: Arc<FakeRelay>,
		api_key: &str,
	) -> RelaySubmitter {
		RelaySubmitter::new(
			controller,
			relay,
			RelayTarget::new(COUNTER, "increment"),
			api_key,
			"https://relay.gelato.digital",
		)
	}

	#[test]
	fn test_increment_selector() {
		let target = RelayTarget::new(COUNTER, "increment");
		let data = target.encode_call().unwrap();
		assert_eq!(data, Bytes::from(hex!("d09de08a")));
		assert_eq!(data.to_vec(), ICounter::incrementCall {}.abi_encode());
	}

	#[test]
	fn test_malformed_method_fails_encoding() {
		let target = RelayTarget::new(COUNTER, "incr ement(");
		assert!(matches!(target.encode_call(), Err(RelayError::Encoding(_))));
	}

	#[tokio::test]
	async fn test_submit_requires_connection() {
		let controller = Arc::new(ConnectionController::new());
		controller.probe(None).await;
		let relay = Arc::new(FakeRelay::default());

		let result = submitter(controller, relay.clone(), "key").submit().await;

		assert!(matches!(result, Err(RelayError::NotConnected)));
		assert!(relay.submitted.lock().unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_submit_fails_fast_when_no_accounts() {
		let controller = connected_controller(vec![]).await;
		let relay = Arc::new(FakeRelay::default());

		let result = submitter(controller, relay.clone(), "key").submit().await;

		assert!(matches!(result, Err(RelayError::NotConnected)));
		assert!(relay.submitted.lock().unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_submit_builds_exact_request() {
		let controller = connected_controller(vec![USER]).await;
		let relay = Arc::new(FakeRelay::default());
		let submitter = submitter(controller, relay.clone(), "key");

		let task = submitter.submit().await.unwrap();

		assert_eq!(task, RelayTaskHandle::new("0xtask1"));
		let submitted = relay.submitted.lock().unwrap();
		assert_eq!(submitted.len(), 1);
		let (request, signer, api_key) = &submitted[0];
		assert_eq!(
			request,
			&RelayRequest {
				chain_id: 137,
				target: COUNTER,
				data: Bytes::from(hex!("d09de08a")),
				user: USER,
			}
		);
		assert_eq!(signer, &USER);
		assert_eq!(api_key, "key");
		assert_eq!(
			submitter.status_url(&task),
			"https://relay.gelato.digital/tasks/status/0xtask1"
		);
	}

	#[tokio::test]
	async fn test_each_submit_creates_a_new_task() {
		let controller = connected_controller(vec![USER]).await;
		let relay = Arc::new(FakeRelay::default());
		let submitter = submitter(controller, relay.clone(), "key");

		let first = submitter.submit().await.unwrap();
		let second = submitter.submit().await.unwrap();

		assert_ne!(first, second);
		assert_eq!(relay.submitted.lock().unwrap().len(), 2);
	}

	#[tokio::test]
	async fn test_relay_rejection_propagates_and_keeps_connection() {
		let controller = connected_controller(vec![USER]).await;
		let relay = Arc::new(FakeRelay {
			reject_empty_key: true,
			..Default::default()
		});
		let submitter = submitter(controller.clone(), relay, "");

		let result = submitter.submit().await;

		assert!(matches!(result, Err(RelayError::Rejected { status: 401, .. })));
		assert!(controller.is_connected());
	}

	#[tokio::test]
	async fn test_task_status_delegates_to_relay() {
		let controller = connected_controller(vec![USER]).await;
		let relay = Arc::new(FakeRelay::default());
		let submitter = submitter(controller, relay, "key");

		let status = submitter
			.task_status(&RelayTaskHandle::new("0xabc"))
			.await
			.unwrap();
		assert_eq!(status.task_id, "0xabc");
		assert!(status.task_state.is_final());
	}
}
