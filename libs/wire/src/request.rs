//! `POST /v1/execute` body.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Command, Credentials};

/// Body of `POST /v1/execute`.
///
/// `command` and `args` are kept loose so the service can answer a bad
/// command name with its own error instead of a body rejection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteRequest {
    pub credentials: Credentials,
    pub command: String,
    #[serde(default)]
    pub args: Value,
}

impl ExecuteRequest {
    pub fn new(credentials: Credentials, command: &Command) -> Result<Self, serde_json::Error> {
        let mut wire = serde_json::to_value(command)?;
        Ok(Self {
            credentials,
            command: command.name().to_string(),
            args: wire.get_mut("args").map(Value::take).unwrap_or(Value::Null),
        })
    }

    /// Parse `command` and `args` into a typed command.
    pub fn parse_command(&self) -> Result<Command, serde_json::Error> {
        Command::parse(&self.command, self.args.clone())
    }
}
