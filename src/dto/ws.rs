use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::dto::validation::validate_party_code;

/// Messages accepted from room WebSocket clients.
#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Must be the first frame of every connection.
    #[serde(rename = "join_room")]
    JoinRoom(JoinRoom),
    #[serde(other)]
    Unknown,
}

/// Payload of the `join_room` frame.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoom {
    #[validate(custom(function = validate_party_code))]
    pub party_code: String,
    pub participant_id: Uuid,
}

impl ClientMessage {
    /// Parse a text frame and validate its content.
    pub fn from_json_str(text: &str) -> Result<Self, ClientMessageError> {
        let message: Self = serde_json::from_str(text)?;
        if let Self::JoinRoom(join) = &message {
            join.validate()?;
        }
        Ok(message)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientMessageError {
    #[error("malformed frame: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid frame: {0}")]
    Invalid(#[from] validator::ValidationErrors),
}

/// Frame pushed to room subscribers: `{"event": <name>, "data": <payload>}`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ServerEvent {
    pub event: String,
    #[schema(value_type = Object)]
    pub data: serde_json::Value,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the data field.
    pub fn json<T>(event: impl Into<String>, payload: &T) -> serde_json::Result<Self>
    where
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_value(payload)?,
        })
    }
}
