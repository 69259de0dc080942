//! Wallet connection state machine.
//!
//! The [`ConnectionController`] is the single owner of the client's view of
//! the wallet: connection status, network identity and the signer derived
//! from the first authorized account. The state only changes through
//! [`probe`](ConnectionController::probe) and the request operations, and
//! observers always read one consistent [`Connection`] snapshot.
//!
//! ```text
//! Idle --probe--> Probing(pending)
//! Probing --no provider--> Missing
//! Probing --provider, 0 accounts--> Failed
//! Probing --provider, >=1 accounts--> Connected
//! Failed --connect (permission request + probe)--> Failed | Connected
//! ```

use alloy::primitives::Address;
use arc_swap::ArcSwap;
use dapp_types::{ChainIdentity, ConnectionStatus};
use dapp_wallet::{SignerHandle, WalletInterface};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Snapshot of the connection as seen at one point in time.
///
/// `signer` is `Some` exactly when `status.state` is [`ConnectionState::Success`](dapp_types::ConnectionState::Success).
#[derive(Debug, Clone, Default)]
pub struct Connection {
	pub status: ConnectionStatus,
	pub chain: ChainIdentity,
	pub signer: Option<SignerHandle>,
}

impl Connection {
	fn missing() -> Self {
		Self {
			status: ConnectionStatus::missing(),
			chain: ChainIdentity::default(),
			signer: None,
		}
	}

	fn pending(chain: ChainIdentity) -> Self {
		Self {
			status: ConnectionStatus::pending(),
			chain,
			signer: None,
		}
	}

	fn failed(message: impl Into<String>, chain: ChainIdentity) -> Self {
		Self {
			status: ConnectionStatus::failed(message),
			chain,
			signer: None,
		}
	}

	fn connected(chain: ChainIdentity, signer: SignerHandle) -> Self {
		Self {
			status: ConnectionStatus::success(),
			chain,
			signer: Some(signer),
		}
	}

	pub fn is_connected(&self) -> bool {
		self.status.is_success() && self.signer.is_some()
	}

	pub fn signer_address(&self) -> Option<Address> {
		self.signer.as_ref().map(SignerHandle::address)
	}
}

/// Owns the connection state and keeps it consistent with the wallet.
pub struct ConnectionController {
	/// Current snapshot, replaced as a whole on every transition.
	state: ArcSwap<Connection>,
	/// Provider recorded by the last probe.
	wallet: RwLock<Option<Arc<dyn WalletInterface>>>,
	/// Serializes state transitions.
	transition: Mutex<()>,
}

impl Default for ConnectionController {
	fn default() -> Self {
		Self::new()
	}
}

impl ConnectionController {
	/// Creates a controller in the initial `missing` ("Loading") state.
	pub fn new() -> Self {
		Self {
			state: ArcSwap::from_pointee(Connection::default()),
			wallet: RwLock::new(None),
			transition: Mutex::new(()),
		}
	}

	pub fn state(&self) -> Arc<Connection> {
		self.state.load_full()
	}

	pub fn status(&self) -> ConnectionStatus {
		self.state.load().status.clone()
	}

	pub fn chain(&self) -> ChainIdentity {
		self.state.load().chain.clone()
	}

	/// Signer from the last successful probe. Re-read before every use.
	pub fn signer(&self) -> Option<SignerHandle> {
		self.state.load().signer.clone()
	}

	pub fn signer_address(&self) -> Option<Address> {
		self.state.load().signer_address()
	}

	pub fn is_connected(&self) -> bool {
		self.state.load().is_connected()
	}

	/// Provider recorded by the last probe, if any.
	pub async fn wallet(&self) -> Option<Arc<dyn WalletInterface>> {
		self.wallet.read().await.clone()
	}

	fn publish(&self, next: Connection) -> Arc<Connection> {
		let next = Arc::new(next);
		self.state.store(next.clone());
		info!(
			state = %next.status.state,
			chain = %next.chain,
			signer = ?next.signer_address(),
			"{}",
			next.status.message
		);
		next
	}

	/// Derives status, network and signer from `wallet`.
	///
	/// An absent provider ends in `missing` with no network. Otherwise the
	/// network and the authorized accounts are queried: a non-empty list binds
	/// the signer to its first account, an empty list or a failed query ends in
	/// `failed` while keeping whatever network identity was observed.
	pub async fn probe(&self, wallet: Option<Arc<dyn WalletInterface>>) -> Arc<Connection> {
		let _guard = self.transition.lock().await;
		*self.wallet.write().await = wallet.clone();

		let Some(wallet) = wallet else {
			return self.publish(Connection::missing());
		};

		let previous_chain = self.state.load().chain.clone();
		self.publish(Connection::pending(previous_chain.clone()));

		let chain = match wallet.network().await {
			Ok(chain) => chain,
			Err(e) => {
				warn!("Failed to query wallet network: {}", e);
				return self.publish(Connection::failed(e.to_string(), previous_chain));
			}
		};

		let accounts = match wallet.accounts().await {
			Ok(accounts) => accounts,
			Err(e) => {
				warn!("Failed to list wallet accounts: {}", e);
				return self.publish(Connection::failed(e.to_string(), chain));
			}
		};

		match accounts.first() {
			Some(&address) => {
				let signer = SignerHandle::new(address, wallet);
				self.publish(Connection::connected(chain, signer))
			}
			None => self.publish(Connection::failed(ConnectionStatus::FAILED, chain)),
		}
	}

	/// Probes again with the provider recorded by the last probe.
	pub async fn refresh(&self) -> Arc<Connection> {
		let wallet = self.wallet().await;
		self.probe(wallet).await
	}

	/// Asks the wallet for account permission.
	///
	/// This transition has no failure channel: a rejected or failed request
	/// leaves the status untouched and the outcome only becomes visible on
	/// the next probe. Without a provider it does nothing.
	pub async fn request_connect(&self) {
		let Some(wallet) = self.wallet().await else {
			debug!("No wallet provider, ignoring connect request");
			return;
		};

		match wallet.request_permissions().await {
			Ok(()) => debug!("Wallet permission request completed"),
			Err(e) => warn!("Wallet permission request not completed: {}", e),
		}
	}

	/// Permission request followed by a probe, returning the resulting state.
	pub async fn connect(&self) -> Arc<Connection> {
		self.request_connect().await;
		self.refresh().await
	}

	/// Asks the wallet to re-confirm its accounts.
	///
	/// The status is set to `failed` ("Waiting for Disconnection") right away
	/// and the signer is dropped. Wallets offer no programmatic revocation, so
	/// this does not revoke anything on the wallet side; whether the
	/// connection is really gone is only known after the next probe.
	pub async fn request_disconnect(&self) {
		let Some(wallet) = self.wallet().await else {
			debug!("No wallet provider, ignoring disconnect request");
			return;
		};

		{
			let _guard = self.transition.lock().await;
			let chain = self.state.load().chain.clone();
			self.publish(Connection::failed(ConnectionStatus::DISCONNECTING, chain));
		}

		if let Err(e) = wallet.request_accounts().await {
			warn!("Wallet account request not completed: {}", e);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy::dyn_abi::TypedData;
	use alloy::primitives::{address, Bytes};
	use async_trait::async_trait;
	use dapp_types::{ConfigSchema, ConnectionState, ValidationError};
	use dapp_wallet::WalletError;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::sync::Mutex as StdMutex;
	use tokio::sync::Notify;

	const ABC: Address = address!("0000000000000000000000000000000000000abc");
	const DEF: Address = address!("0000000000000000000000000000000000000def");

	struct NoSchema;

	impl ConfigSchema for NoSchema {
		fn validate(&self, _config: &toml::Value) -> Result<(), ValidationError> {
			Ok(())
		}
	}

	/// In-memory wallet whose authorized accounts can be changed by tests.
	struct FakeWallet {
		chain: ChainIdentity,
		accounts: StdMutex<Vec<Address>>,
		/// Accounts granted when permission is requested; `None` means the user rejects.
		grant: Option<Vec<Address>>,
		network_error: bool,
		permission_requests: AtomicUsize,
		account_requests: AtomicUsize,
		/// When set, `accounts` waits for a notification before answering.
		gate: Option<Arc<Notify>>,
	}

	impl FakeWallet {
		fn new(chain: ChainIdentity, accounts: Vec<Address>) -> Self {
			Self {
				chain,
				accounts: StdMutex::new(accounts),
				grant: None,
				network_error: false,
				permission_requests: AtomicUsize::new(0),
				account_requests: AtomicUsize::new(0),
				gate: None,
			}
		}

		fn granting(mut self, accounts: Vec<Address>) -> Self {
			self.grant = Some(accounts);
			self
		}
	}

	#[async_trait]
	impl WalletInterface for FakeWallet {
		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			Box::new(NoSchema)
		}

		async fn request_permissions(&self) -> Result<(), WalletError> {
			self.permission_requests.fetch_add(1, Ordering::SeqCst);
			match &self.grant {
				Some(granted) => {
					*self.accounts.lock().unwrap() = granted.clone();
					Ok(())
				}
				None => Err(WalletError::Rejected("User rejected the request.".into())),
			}
		}

		async fn request_accounts(&self) -> Result<Vec<Address>, WalletError> {
			self.account_requests.fetch_add(1, Ordering::SeqCst);
			Ok(self.accounts.lock().unwrap().clone())
		}

		async fn accounts(&self) -> Result<Vec<Address>, WalletError> {
			if let Some(gate) = &self.gate {
				gate.notified().await;
			}
			Ok(self.accounts.lock().unwrap().clone())
		}

		async fn network(&self) -> Result<ChainIdentity, WalletError> {
			if self.network_error {
				return Err(WalletError::Rpc("eth_chainId failed".into()));
			}
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

	fn mainnet() -> ChainIdentity {
		ChainIdentity::new("mainnet", 1)
	}

	#[tokio::test]
	async fn test_initial_state_is_loading() {
		let controller = ConnectionController::new();
		let status = controller.status();
		assert_eq!(status.state, ConnectionState::Missing);
		assert_eq!(status.message, "Loading");
		assert!(controller.signer().is_none());
	}

	#[tokio::test]
	async fn test_probe_without_provider_is_missing() {
		let controller = ConnectionController::new();
		let state = controller.probe(None).await;

		assert_eq!(state.status.state, ConnectionState::Missing);
		assert!(!state.chain.is_set());
		assert!(state.signer.is_none());
		assert!(!controller.is_connected());
	}

	#[tokio::test]
	async fn test_provider_removed_after_success_tears_down_connection() {
		let controller = ConnectionController::new();
		let wallet = Arc::new(FakeWallet::new(mainnet(), vec![ABC]));
		controller.probe(Some(wallet)).await;
		assert!(controller.is_connected());

		let state = controller.probe(None).await;

		assert_eq!(state.status.state, ConnectionState::Missing);
		assert_eq!(state.status.message, "Wallet not found");
		assert!(!state.chain.is_set());
		assert!(state.signer.is_none());
		assert!(controller.signer().is_none());
		assert_eq!(controller.chain(), ChainIdentity::default());
		assert!(controller.wallet().await.is_none());

		// Without a recorded provider, refresh stays missing.
		let state = controller.refresh().await;
		assert_eq!(state.status.state, ConnectionState::Missing);
	}

	#[tokio::test]
	async fn test_probe_binds_signer_to_first_account() {
		let controller = ConnectionController::new();
		let wallet = Arc::new(FakeWallet::new(mainnet(), vec![ABC, DEF]));

		let state = controller.probe(Some(wallet)).await;

		assert_eq!(state.status.state, ConnectionState::Success);
		assert_eq!(state.chain, ChainIdentity::new("mainnet", 1));
		assert_eq!(state.signer_address(), Some(ABC));
		assert_eq!(controller.signer_address(), Some(ABC));
		assert!(controller.is_connected());
	}

	#[tokio::test]
	async fn test_probe_with_no_accounts_fails_but_keeps_network() {
		let controller = ConnectionController::new();
		let wallet = Arc::new(FakeWallet::new(mainnet(), vec![]));

		let state = controller.probe(Some(wallet)).await;

		assert_eq!(state.status.state, ConnectionState::Failed);
		assert_eq!(state.status.message, "Connection Failed");
		assert_eq!(state.chain, mainnet());
		assert!(state.signer.is_none());
	}

	#[tokio::test]
	async fn test_probe_clears_previous_signer() {
		let controller = ConnectionController::new();
		let wallet = Arc::new(FakeWallet::new(mainnet(), vec![ABC]));
		controller.probe(Some(wallet.clone())).await;
		assert!(controller.is_connected());

		wallet.accounts.lock().unwrap().clear();
		let state = controller.refresh().await;

		assert_eq!(state.status.state, ConnectionState::Failed);
		assert!(controller.signer().is_none());
	}

	#[tokio::test]
	async fn test_probe_is_repeatable_for_same_wallet_state() {
		let controller = ConnectionController::new();
		let wallet = Arc::new(FakeWallet::new(mainnet(), vec![ABC]));

		let first = controller.probe(Some(wallet.clone())).await;
		let second = controller.probe(Some(wallet)).await;

		assert_eq!(first.status, second.status);
		assert_eq!(first.chain, second.chain);
		assert_eq!(first.signer_address(), second.signer_address());
	}

	#[tokio::test]
	async fn test_network_error_becomes_failed_status() {
		let controller = ConnectionController::new();
		let mut wallet = FakeWallet::new(mainnet(), vec![ABC]);
		wallet.network_error = true;

		let state = controller.probe(Some(Arc::new(wallet))).await;

		assert_eq!(state.status.state, ConnectionState::Failed);
		assert!(state.status.message.contains("eth_chainId"));
		assert!(state.signer.is_none());
	}

	#[tokio::test]
	async fn test_pending_is_observable_during_probe() {
		let controller = Arc::new(ConnectionController::new());
		let gate = Arc::new(Notify::new());
		let mut wallet = FakeWallet::new(mainnet(), vec![ABC]);
		wallet.gate = Some(gate.clone());

		let probing = {
			let controller = controller.clone();
			tokio::spawn(async move { controller.probe(Some(Arc::new(wallet))).await })
		};

		while controller.status().state != ConnectionState::Pending {
			tokio::task::yield_now().await;
		}
		let observed = controller.state();
		assert_eq!(observed.status.message, "Connecting");
		assert!(observed.signer.is_none());

		gate.notify_one();
		let state = probing.await.unwrap();
		assert_eq!(state.status.state, ConnectionState::Success);
	}

	#[tokio::test]
	async fn test_request_connect_absorbs_rejection() {
		let controller = ConnectionController::new();
		let wallet = Arc::new(FakeWallet::new(mainnet(), vec![]));
		controller.probe(Some(wallet.clone())).await;

		controller.request_connect().await;

		assert_eq!(wallet.permission_requests.load(Ordering::SeqCst), 1);
		assert_eq!(controller.status().state, ConnectionState::Failed);
		assert_eq!(controller.status().message, "Connection Failed");
	}

	#[tokio::test]
	async fn test_request_connect_without_provider_is_noop() {
		let controller = ConnectionController::new();
		controller.probe(None).await;

		controller.request_connect().await;

		assert_eq!(controller.status().state, ConnectionState::Missing);
	}

	#[tokio::test]
	async fn test_request_connect_is_observed_by_next_probe() {
		let controller = ConnectionController::new();
		let wallet = Arc::new(FakeWallet::new(mainnet(), vec![]).granting(vec![DEF]));
		controller.probe(Some(wallet)).await;

		controller.request_connect().await;
		assert_eq!(controller.status().state, ConnectionState::Failed);

		let state = controller.refresh().await;
		assert_eq!(state.status.state, ConnectionState::Success);
		assert_eq!(state.signer_address(), Some(DEF));
	}

	#[tokio::test]
	async fn test_connect_chains_probe() {
		let controller = ConnectionController::new();
		let wallet = Arc::new(FakeWallet::new(mainnet(), vec![]).granting(vec![ABC]));
		controller.probe(Some(wallet)).await;

		let state = controller.connect().await;

		assert!(state.is_connected());
		assert_eq!(state.signer_address(), Some(ABC));
	}

	#[tokio::test]
	async fn test_request_disconnect_sets_waiting_and_asks_wallet() {
		let controller = ConnectionController::new();
		let wallet = Arc::new(FakeWallet::new(mainnet(), vec![ABC]));
		controller.probe(Some(wallet.clone())).await;

		controller.request_disconnect().await;

		let state = controller.state();
		assert_eq!(state.status.state, ConnectionState::Failed);
		assert_eq!(state.status.message, "Waiting for Disconnection");
		assert!(state.signer.is_none());
		assert_eq!(state.chain, mainnet());
		assert_eq!(wallet.account_requests.load(Ordering::SeqCst), 1);

		// The wallet still exposes the account, so the next probe reconnects.
		assert!(controller.refresh().await.is_connected());
	}

	#[tokio::test]
	async fn test_request_disconnect_without_provider_keeps_missing() {
		let controller = ConnectionController::new();
		controller.probe(None).await;

		controller.request_disconnect().await;

		assert_eq!(controller.status().state, ConnectionState::Missing);
	}
}
