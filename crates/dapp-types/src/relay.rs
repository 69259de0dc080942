//! Relay request and task types.
//!
//! A `RelayRequest` describes one sponsored contract call. It is built fresh
//! for every submission and never persisted. The relay answers with a task
//! identifier that can be looked up out of band.

use alloy::primitives::{Address, Bytes};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A sponsored call to be executed by the relay on behalf of `user`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayRequest {
	/// Chain the call executes on.
	pub chain_id: u64,
	/// Contract receiving the call.
	pub target: Address,
	/// ABI-encoded call data.
	pub data: Bytes,
	/// Address of the signer the call is made for.
	pub user: Address,
}

/// Identifier returned by the relay for a submitted call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayTaskHandle {
	pub task_id: String,
}

impl RelayTaskHandle {
	pub fn new(task_id: impl Into<String>) -> Self {
		Self {
			task_id: task_id.into(),
		}
	}

	/// URL under which the task status can be tracked, e.g.
	/// `https://relay.gelato.digital/tasks/status/<taskId>`.
	pub fn status_url(&self, status_base: &str) -> String {
		format!(
			"{}/tasks/status/{}",
			status_base.trim_end_matches('/'),
			self.task_id
		)
	}
}

impl fmt::Display for RelayTaskHandle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.task_id)
	}
}

/// Execution state of a relay task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskState {
	CheckPending,
	ExecPending,
	WaitingForConfirmation,
	ExecSuccess,
	ExecReverted,
	Cancelled,
	#[serde(other)]
	Unknown,
}

impl TaskState {
	/// Whether the relay will not change this task any further.
	pub fn is_final(&self) -> bool {
		matches!(
			self,
			TaskState::ExecSuccess | TaskState::ExecReverted | TaskState::Cancelled
		)
	}
}

/// Status of a relay task as reported by the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatus {
	pub task_id: String,
	pub chain_id: u64,
	pub task_state: TaskState,
	#[serde(default)]
	pub transaction_hash: Option<String>,
	#[serde(default)]
	pub block_number: Option<u64>,
	#[serde(default)]
	pub last_check_message: Option<String>,
}
