//! Data model shared by the bootstrap coordinator, the submission service and
//! the status translator.

use std::collections::BTreeMap;

use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumString};

/// Queue-wide unique task identifier (32 lower-case hex characters).
pub type TaskId = String;

/// Returns the current UTC wall-clock time without offset, the format used
/// for every `last_update` field.
pub fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

// ── Bootstrap record ──────────────────────────────────────────────────────────

/// Lifecycle of the one-time bootstrap ceremony.
///
/// The `absent` state is not a variant: it is the absence of a
/// [`BootstrapRecord`] in the state store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BootstrapState {
    /// Lock acquired, task queued; the worker has not started signing yet.
    Pre,
    /// The worker is running the signing ceremony.
    Signing,
    /// Bootstrap completed; the repository accepts artifact changes.
    Finished,
}

impl BootstrapState {
    pub fn is_finished(self) -> bool {
        matches!(self, BootstrapState::Finished)
    }

    /// `signing` or `finished`: the root metadata exists and may collect
    /// signatures.
    pub fn accepts_signatures(self) -> bool {
        matches!(self, BootstrapState::Signing | BootstrapState::Finished)
    }
}

/// The single, process-wide bootstrap lock record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapRecord {
    pub task_id: TaskId,
    pub state: BootstrapState,
}

impl BootstrapRecord {
    /// The record written by a successful lock acquisition.
    pub fn pre(task_id: impl Into<TaskId>) -> Self {
        Self {
            task_id: task_id.into(),
            state: BootstrapState::Pre,
        }
    }
}

// ── Task requests ─────────────────────────────────────────────────────────────

/// Operation requested from the repository worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Action {
    Bootstrap,
    AddTargets,
    RemoveTargets,
    PublishTargets,
    /// Rotate role metadata (new root).
    MetadataUpdate,
    /// Add a signature to metadata awaiting offline signing.
    SignMetadata,
    /// Drop metadata awaiting offline signing.
    DeleteSignMetadata,
}

impl Action {
    /// Logical destination queue for this action.
    ///
    /// Publishing is internal maintenance and never mutates repository
    /// content, so it is routed away from the metadata queue.
    pub fn queue(self) -> QueueName {
        match self {
            Action::PublishTargets => QueueName::RstufInternals,
            Action::Bootstrap
            | Action::AddTargets
            | Action::RemoveTargets
            | Action::MetadataUpdate
            | Action::SignMetadata
            | Action::DeleteSignMetadata => QueueName::MetadataRepository,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum QueueName {
    MetadataRepository,
    RstufInternals,
}

/// Delivery acknowledgement mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AckMode {
    /// Acknowledge on delivery; a crashed worker loses the task.
    Early,
    /// Acknowledge once processing finishes; a crashed worker causes
    /// redelivery.
    Late,
}

/// A unit of work handed to the task queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRequest {
    pub task_id: TaskId,
    pub queue: QueueName,
    pub action: Action,
    pub payload: Value,
    pub ack_mode: AckMode,
}

impl TaskRequest {
    /// Build a late-acknowledged request routed to the action's queue.
    pub fn new(task_id: impl Into<TaskId>, action: Action, payload: Value) -> Self {
        Self {
            task_id: task_id.into(),
            queue: action.queue(),
            action,
            payload,
            ack_mode: AckMode::Late,
        }
    }
}

// ── Task results ──────────────────────────────────────────────────────────────

/// Execution state of a task.
///
/// Every variant except [`TaskState::Errored`] is queue-native.  `ERRORED` is
/// produced only by the status translator for tasks the queue reports as
/// `SUCCESS` whose business outcome was a failure.
///
/// Parsing never fails: states the worker reports that are not listed here
/// (`RUNNING`, `REJECTED`, `IGNORED`, ...) are kept verbatim in
/// [`TaskState::Other`] and count as in progress.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(from = "String", into = "String")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    Pending,
    Received,
    Started,
    Retry,
    Success,
    Failure,
    Revoked,
    Errored,
    #[strum(default)]
    Other(String),
}

impl TaskState {
    /// Returns `true` once the queue will not change the state any more.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Success | TaskState::Failure | TaskState::Revoked | TaskState::Errored
        )
    }
}

impl From<String> for TaskState {
    fn from(raw: String) -> Self {
        match raw.parse() {
            Ok(state) => state,
            Err(never) => match never {},
        }
    }
}

impl From<TaskState> for String {
    fn from(state: TaskState) -> Self {
        state.to_string()
    }
}

/// Raw task state and result as stored by the queue backend.
///
/// `result` is kept as undecoded JSON; interpretation happens once, in
/// [`crate::tasks`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub state: TaskState,
    #[serde(default)]
    pub result: Value,
}

impl TaskResult {
    pub fn new(state: TaskState, result: Value) -> Self {
        Self { state, result }
    }

    /// What the queue reports for a task it has never seen.
    pub fn pending() -> Self {
        Self::new(TaskState::Pending, Value::Null)
    }
}

/// A worker result, decoded from the queue's JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum RawResult {
    /// Outcome object returned by the worker function
    /// (`status`, `task`, `message`, `last_update`, `details`, `error`).
    Structured(Map<String, Value>),
    /// The worker function raised; only its message survives.
    RawError(String),
}

impl RawResult {
    /// Decode a queue result. `null` decodes to `None`.
    ///
    /// Serialized exceptions (objects carrying `exc_type` / `exc_message`)
    /// and bare strings decode to [`RawResult::RawError`]; any other object
    /// is a structured outcome.
    pub fn decode(value: Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Object(map) if is_serialized_exception(&map) => {
                Some(RawResult::RawError(exception_message(&map)))
            }
            Value::Object(map) => Some(RawResult::Structured(map)),
            Value::String(message) => Some(RawResult::RawError(message)),
            other => Some(RawResult::RawError(other.to_string())),
        }
    }

    /// Client-facing JSON: structured outcomes unchanged, raised errors as
    /// `{"message": <text>}`.
    pub fn into_value(self) -> Value {
        match self {
            RawResult::Structured(map) => Value::Object(map),
            RawResult::RawError(message) => serde_json::json!({ "message": message }),
        }
    }
}

fn is_serialized_exception(map: &Map<String, Value>) -> bool {
    map.contains_key("exc_type") || map.contains_key("exc_message")
}

fn exception_message(map: &Map<String, Value>) -> String {
    match map.get("exc_message") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(parts)) => parts
            .iter()
            .map(|p| match p {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(", "),
        _ => map
            .get("exc_type")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_owned(),
    }
}

// ── Bootstrap payload ─────────────────────────────────────────────────────────

/// Metadata roles that carry an expiration policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    Root,
    Targets,
    Snapshot,
    Timestamp,
    Bins,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSettings {
    pub targets_base_url: String,
    pub number_of_delegated_bins: u32,
    pub targets_online_key: bool,
}

/// Repository settings applied by the bootstrap ceremony.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Expiration in days, per role.
    pub expiration: BTreeMap<Role, u32>,
    pub services: ServiceSettings,
}

/// Everything the worker needs to run the ceremony.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootstrapPayload {
    pub settings: Settings,
    /// Signed role metadata keyed by role name; only `root` is accepted.
    pub metadata: Map<String, Value>,
    /// Watchdog timeout in seconds.
    pub timeout: u64,
}

// ── Artifacts ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactInfo {
    pub length: u64,
    /// Digest keyed by algorithm name (`sha256`, `blake2b-256`, ...).
    pub hashes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub info: ArtifactInfo,
    pub path: String,
}
