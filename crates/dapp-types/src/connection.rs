//! Wallet connection types.
//!
//! This module defines the observable connection status of the client and the
//! identity of the network the wallet is attached to.

use alloy_chains::Chain;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The four states a wallet connection can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
	/// No wallet provider is present.
	Missing,
	/// A probe is in flight.
	Pending,
	/// The wallet exposed at least one account at the last probe.
	Success,
	/// The wallet is present but exposed no account, or could not be queried.
	Failed,
}

impl fmt::Display for ConnectionState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			ConnectionState::Missing => "missing",
			ConnectionState::Pending => "pending",
			ConnectionState::Success => "success",
			ConnectionState::Failed => "failed",
		};
		f.write_str(s)
	}
}

/// Connection state together with a human readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatus {
	pub state: ConnectionState,
	pub message: String,
}

impl ConnectionStatus {
	pub const LOADING: &'static str = "Loading";
	pub const NOT_FOUND: &'static str = "Wallet not found";
	pub const CONNECTING: &'static str = "Connecting";
	pub const SUCCEEDED: &'static str = "Connection Succeeded";
	pub const FAILED: &'static str = "Connection Failed";
	pub const DISCONNECTING: &'static str = "Waiting for Disconnection";

	pub fn new(state: ConnectionState, message: impl Into<String>) -> Self {
		Self {
			state,
			message: message.into(),
		}
	}

	/// Status at process start, before the first probe has completed.
	pub fn loading() -> Self {
		Self::new(ConnectionState::Missing, Self::LOADING)
	}

	pub fn missing() -> Self {
		Self::new(ConnectionState::Missing, Self::NOT_FOUND)
	}

	pub fn pending() -> Self {
		Self::new(ConnectionState::Pending, Self::CONNECTING)
	}

	pub fn success() -> Self {
		Self::new(ConnectionState::Success, Self::SUCCEEDED)
	}

	pub fn failed(message: impl Into<String>) -> Self {
		Self::new(ConnectionState::Failed, message)
	}

	pub fn is_success(&self) -> bool {
		self.state == ConnectionState::Success
	}
}

impl Default for ConnectionStatus {
	fn default() -> Self {
		Self::loading()
	}
}

impl fmt::Display for ConnectionStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} ({})", self.state, self.message)
	}
}

/// Name and numeric id of the network the wallet reports.
///
/// Empty name and id zero until the first probe that reaches a provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainIdentity {
	pub name: String,
	pub id: u64,
}

impl ChainIdentity {
	pub fn new(name: impl Into<String>, id: u64) -> Self {
		Self {
			name: name.into(),
			id,
		}
	}

	/// Builds the identity for a chain id using its canonical name,
	/// or `unknown` when the id is not a named chain.
	pub fn from_id(id: u64) -> Self {
		let name = Chain::from_id(id)
			.named()
			.map(|named| named.to_string())
			.unwrap_or_else(|| "unknown".to_string());
		Self::new(name, id)
	}

	pub fn is_set(&self) -> bool {
		self.id != 0
	}
}

impl fmt::Display for ChainIdentity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} {}", self.name, self.id)
	}
}
