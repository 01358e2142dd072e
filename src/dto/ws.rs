use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use validator::{Validate, ValidationErrors};

use crate::dto::{room::MirrorSnapshot, validation::validate_race_result};

/// Longest display name a player can pick.
pub const MAX_NAME_LENGTH: u64 = 32;

/// Reasons an inbound frame is dropped before it reaches the room.
#[derive(Debug, Error)]
pub enum InboundError {
    /// The frame is not a `{type, values}` JSON envelope.
    #[error("malformed message: {0}")]
    Malformed(#[source] serde_json::Error),
    /// The `values` object does not match the schema of the message type.
    #[error("invalid values for `{kind}`: {source}")]
    InvalidValues {
        /// Message type whose values failed to parse.
        kind: String,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },
    /// The values parsed but break a validation rule.
    #[error("validation failed: {0}")]
    Invalid(#[from] ValidationErrors),
}

/// Wire envelope shared by every inbound message.
#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    values: serde_json::Value,
}

#[derive(Debug, Deserialize, ToSchema)]
/// Values of a `ready` message.
pub struct ReadyValues {
    /// Whether the sender is ready.
    #[serde(rename = "isReady")]
    pub is_ready: bool,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
/// Values of an `updateName` message.
pub struct UpdateNameValues {
    /// New display name.
    #[validate(length(max = MAX_NAME_LENGTH))]
    pub name: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
/// Values of a `finished` message.
pub struct FinishedValues {
    /// Result reported by the client for the race (e.g. words per minute).
    #[validate(custom(function = "validate_result"))]
    pub result: f64,
}

/// Messages accepted from player WebSocket clients.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// The sender toggles its ready flag.
    Ready {
        /// New ready flag.
        is_ready: bool,
    },
    /// The sender picks a display name.
    UpdateName {
        /// New display name.
        name: String,
    },
    /// The sender completed the race.
    Finished {
        /// Reported result.
        result: f64,
    },
    /// The sender asks for a fresh snapshot.
    Mirror,
    /// A message type this server does not know about.
    Unknown {
        /// Raw `type` field.
        kind: String,
    },
}

impl InboundMessage {
    /// Parse and validate a text frame.
    pub fn from_json_str(text: &str) -> Result<Self, InboundError> {
        let envelope: RawEnvelope = serde_json::from_str(text).map_err(InboundError::Malformed)?;
        let RawEnvelope { kind, values } = envelope;

        let message = match kind.as_str() {
            "ready" => {
                let ReadyValues { is_ready } = parse_values(&kind, values)?;
                Self::Ready { is_ready }
            }
            "updateName" => {
                let values: UpdateNameValues = parse_values(&kind, values)?;
                values.validate()?;
                Self::UpdateName { name: values.name }
            }
            "finished" => {
                let values: FinishedValues = parse_values(&kind, values)?;
                values.validate()?;
                Self::Finished {
                    result: values.result,
                }
            }
            "mirror" => Self::Mirror,
            _ => Self::Unknown { kind },
        };

        Ok(message)
    }

    /// Wire name of the message type, used in logs.
    pub fn kind(&self) -> &str {
        match self {
            Self::Ready { .. } => "ready",
            Self::UpdateName { .. } => "updateName",
            Self::Finished { .. } => "finished",
            Self::Mirror => "mirror",
            Self::Unknown { kind } => kind,
        }
    }
}

fn validate_result(result: f64) -> Result<(), validator::ValidationError> {
    validate_race_result(result)
}

fn parse_values<T>(kind: &str, values: serde_json::Value) -> Result<T, InboundError>
where
    T: for<'de> Deserialize<'de>,
{
    serde_json::from_value(values).map_err(|source| InboundError::InvalidValues {
        kind: kind.to_string(),
        source,
    })
}

/// Messages pushed to player WebSocket clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "values", rename_all = "camelCase")]
pub enum OutboundMessage {
    /// Sent once to a new connection with its assigned identifier.
    Connected {
        /// Identifier of the receiving connection.
        #[serde(rename = "connId")]
        conn_id: String,
    },
    /// The countdown elapsed and the race begins.
    StartGame {},
    /// Full authoritative room snapshot.
    Mirror(MirrorSnapshot),
}
