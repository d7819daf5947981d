// src/session.rs
//
// Owns the mutable side of the application (config, selected period, entry
// book) and applies user commands arriving over a channel. Every command is
// answered with a freshly computed report, so callers never hold stale totals.

use serde::{de, Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::aggregator::{compute_report, Report};
use crate::calendar::Period;
use crate::config::{Config, ConfigError};
use crate::entry::{BookError, EntryBook, EntryId, NewEntry};
use crate::export::{to_csv_string, ExportError};

const COMMAND_BUFFER: usize = 32;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Book(#[from] BookError),
    #[error("Rejected configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Export failed: {0}")]
    Export(#[from] ExportError),
    #[error("Session has shut down")]
    Closed,
}

/// A user action, shaped as `{"action": ..., "payload": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "action",
    content = "payload",
    rename_all = "snake_case",
    try_from = "RawCommand"
)]
pub enum Command {
    Create(NewEntry),
    Delete { id: EntryId },
    SetConfig(Config),
    SetPeriod(Period),
    /// Takes no payload; a missing one, `null` and `{}` are all accepted.
    ExportCsv,
}

const ACTIONS: &[&str] = &["create", "delete", "set_config", "set_period", "export_csv"];

#[derive(Deserialize)]
struct RawCommand {
    action: String,
    #[serde(default)]
    payload: Value,
}

#[derive(Deserialize)]
struct DeletePayload {
    id: EntryId,
}

impl TryFrom<RawCommand> for Command {
    type Error = serde_json::Error;

    fn try_from(raw: RawCommand) -> Result<Self, Self::Error> {
        let payload = raw.payload;
        let command = match raw.action.as_str() {
            "create" => Command::Create(serde_json::from_value(payload)?),
            "delete" => {
                let DeletePayload { id } = serde_json::from_value(payload)?;
                Command::Delete { id }
            }
            "set_config" => Command::SetConfig(serde_json::from_value(payload)?),
            "set_period" => Command::SetPeriod(serde_json::from_value(payload)?),
            "export_csv" => match payload {
                Value::Null => Command::ExportCsv,
                Value::Object(fields) if fields.is_empty() => Command::ExportCsv,
                other => {
                    return Err(de::Error::custom(format!(
                        "export_csv takes no payload, got {}",
                        other
                    )))
                }
            },
            other => return Err(de::Error::unknown_variant(other, ACTIONS)),
        };
        Ok(command)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Report(Box<Report>),
    Csv(String),
}

#[derive(Debug, Clone)]
pub struct SessionState {
    pub config: Config,
    pub period: Period,
    pub book: EntryBook,
}

impl SessionState {
    pub fn new(config: Config, period: Period, book: EntryBook) -> Self {
        Self {
            config,
            period,
            book,
        }
    }

    pub fn report(&self) -> Report {
        compute_report(&self.book.to_vec(), &self.config, &self.period)
    }

    /// Applies one command. A rejected command leaves the state unchanged.
    pub fn apply(&mut self, command: Command) -> Result<Outcome, SessionError> {
        match command {
            Command::Create(new_entry) => {
                let id = self.book.insert(new_entry)?;
                debug!("Created entry {}", id);
            }
            Command::Delete { id } => {
                self.book.remove(id)?;
            }
            Command::SetConfig(config) => {
                config.validate()?;
                info!("Configuration updated");
                self.config = config;
            }
            Command::SetPeriod(period) => {
                info!("Period set to {}", period);
                self.period = period;
            }
            Command::ExportCsv => {
                return Ok(Outcome::Csv(to_csv_string(&self.report())?));
            }
        }
        Ok(Outcome::Report(Box::new(self.report())))
    }
}

struct Envelope {
    command: Command,
    reply: oneshot::Sender<Result<Outcome, SessionError>>,
}

/// Cloneable sender side of a running session.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<Envelope>,
}

impl SessionHandle {
    pub async fn send(&self, command: Command) -> Result<Outcome, SessionError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(Envelope { command, reply })
            .await
            .map_err(|_| SessionError::Closed)?;
        response.await.map_err(|_| SessionError::Closed)?
    }
}

/// Starts the session task. It runs until every handle is dropped and then
/// yields its final state.
pub fn spawn_session(state: SessionState) -> (SessionHandle, JoinHandle<SessionState>) {
    let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
    let task = tokio::spawn(run_session(state, rx));
    (SessionHandle { tx }, task)
}

async fn run_session(mut state: SessionState, mut rx: mpsc::Receiver<Envelope>) -> SessionState {
    info!("Session started for {}", state.period);
    while let Some(Envelope { command, reply }) = rx.recv().await {
        debug!("Applying command: {:?}", command);
        let result = state.apply(command);
        if let Err(e) = &result {
            warn!("Command rejected: {}", e);
        }
        if reply.send(result).is_err() {
            error!("Command caller went away before the reply was sent");
        }
    }
    info!("Session closed with {} entries", state.book.len());
    state
}
