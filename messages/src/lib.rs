//! Wire model and JSON codec for the dashboard sync protocol.
//!
//! This crate owns the message envelope shared by the socket channel and the
//! CLI. Every message on the wire is a JSON object with a string `action` tag
//! identifying its purpose; all other members travel verbatim in a field map
//! so server-defined payloads stay flexible, while the shapes the dashboard
//! actually exchanges get concrete structs below.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Error returned by [`decode_message`] and the typed payload accessors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The raw text could not be parsed as JSON.
    #[error("failed to decode sync message: {0}")]
    Decode(#[from] serde_json::Error),
    /// The JSON document is not an object.
    #[error("sync message is not a JSON object")]
    NotAnObject,
    /// The object has no string `action` member.
    #[error("sync message is missing the `action` tag")]
    MissingAction,
    /// The payload does not match the requested shape.
    #[error("invalid `{action}` payload: {source}")]
    InvalidPayload {
        action: String,
        source: serde_json::Error,
    },
}

/// A single message on the sync wire.
///
/// Outbound commands flatten request fields beside the tag
/// (`{"action": "graph_sync", "ticker": "AAPL", ...}`). Inbound replies
/// usually nest the payload under a `data` member, but some server revisions
/// send the payload fields unwrapped; [`Message::parse_data`] accepts both.
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    /// Tag identifying the message's purpose, used for routing and
    /// request/response correlation.
    pub action: String,
    /// Every member of the wire object except `action`.
    pub fields: Map<String, Value>,
}

impl Message {
    #[must_use]
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            fields: Map::new(),
        }
    }

    /// Attach a request field beside the tag.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// The nested `data` payload, if the message carries one.
    #[must_use]
    pub fn data(&self) -> Option<&Value> {
        self.fields.get("data")
    }

    /// Deserialize the payload into `T`.
    ///
    /// Tries the `data` member first; when there is none, the flattened
    /// fields themselves are treated as the payload (the unwrapped form some
    /// server revisions send).
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidPayload`] when the payload does not
    /// deserialize as `T`.
    pub fn parse_data<T: serde::de::DeserializeOwned>(&self) -> Result<T, CodecError> {
        let payload = match self.fields.get("data") {
            Some(data) => data.clone(),
            None => Value::Object(self.fields.clone()),
        };
        serde_json::from_value(payload).map_err(|source| CodecError::InvalidPayload {
            action: self.action.clone(),
            source,
        })
    }
}

/// Encode a message into a UTF-8 JSON text frame.
#[must_use]
pub fn encode_message(message: &Message) -> String {
    let mut map = message.fields.clone();
    map.insert("action".to_owned(), Value::String(message.action.clone()));
    Value::Object(map).to_string()
}

/// Decode a UTF-8 JSON text frame into a message.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] for malformed JSON, [`CodecError::NotAnObject`]
/// for non-object documents, and [`CodecError::MissingAction`] when the object
/// has no string `action` member.
pub fn decode_message(text: &str) -> Result<Message, CodecError> {
    let value = serde_json::from_str::<Value>(text)?;
    let Value::Object(mut map) = value else {
        return Err(CodecError::NotAnObject);
    };
    let Some(Value::String(action)) = map.remove("action") else {
        return Err(CodecError::MissingAction);
    };
    Ok(Message {
        action,
        fields: map,
    })
}

/// Discrete trading state attached to every graph point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeState {
    /// Watching the market, no open position.
    Analyzing,
    /// Holding a long position.
    Bought,
    /// Holding a short position.
    Shorting,
    /// Not trading at all.
    Noop,
}

impl TradeState {
    /// Wire name of the state (its lowercase serde form).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Analyzing => "analyzing",
            Self::Bought => "bought",
            Self::Shorting => "shorting",
            Self::Noop => "noop",
        }
    }
}

/// One point of a ticker's price series, as returned by `graph_sync`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphPoint {
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub price: f64,
    pub state: TradeState,
}

/// Live `update_graph` push appending one point to a ticker's series.
///
/// Pushed with its fields unwrapped at the top level of the message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphUpdate {
    pub ticker: String,
    pub timestamp: i64,
    pub price: f64,
    pub state: TradeState,
}

impl GraphUpdate {
    /// The graph point this update appends.
    #[must_use]
    pub fn point(&self) -> GraphPoint {
        GraphPoint {
            timestamp: self.timestamp,
            price: self.price,
            state: self.state,
        }
    }
}

/// Reply payload of the `start_trading` / `stop_trading` commands.
///
/// A non-`ok` result is still a resolved reply; interpreting it as a failure
/// is the caller's business.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub result: String,
}

impl CommandResult {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.result == "ok"
    }
}

/// Response document of the HTTP `GET /healthcheck` collaborator.
///
/// `internet_check` is reported by some server revisions only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub trade_node_check: bool,
    pub broker_api_check: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internet_check: Option<bool>,
}

impl HealthReport {
    /// True when every reported sub-check passed.
    #[must_use]
    pub fn all_passing(&self) -> bool {
        self.trade_node_check && self.broker_api_check && self.internet_check.unwrap_or(true)
    }
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
