//! Client-to-server command envelopes.
//!
//! Every inbound realtime frame is a tagged envelope `{type, payload}`.
//! [`Command::decode`] turns one text frame into a typed [`Command`] or a
//! [`DecodeError`] describing which layer failed. Callers treat every
//! decode error the same way (log and skip the frame), but the variants
//! keep the log lines precise.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::facility::PumpMode;

/// Envelope type for [`Command::SetPumpMode`].
pub const SET_PUMP_MODE: &str = "SET_PUMP_MODE";

/// Envelope type for [`Command::SetPumpState`].
pub const SET_PUMP_STATE: &str = "SET_PUMP_STATE";

/// Raw tagged envelope as received from a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Command discriminator.
    #[serde(rename = "type")]
    pub kind: String,
    /// Type-specific payload, decoded once `kind` is known.
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Payload of a `SET_PUMP_MODE` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SetPumpModePayload {
    /// Target pump identifier.
    pub id: String,
    /// Requested operating mode.
    #[serde(rename = "pumpMode")]
    pub mode: PumpMode,
}

/// Payload of a `SET_PUMP_STATE` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SetPumpStatePayload {
    /// Target pump identifier.
    pub id: String,
    /// Requested actuation state.
    pub on: bool,
}

/// A decoded operator command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Overwrite a pump's operating mode.
    SetPumpMode(SetPumpModePayload),
    /// Switch a MANUAL pump on or off.
    SetPumpState(SetPumpStatePayload),
}

/// Why an inbound frame could not be turned into a [`Command`].
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The frame is not a `{type, payload}` JSON object.
    #[error("malformed envelope: {0}")]
    Envelope(#[source] serde_json::Error),

    /// The envelope type is known but its payload has the wrong shape.
    #[error("malformed {kind} payload: {source}")]
    Payload {
        /// The envelope type whose payload failed.
        kind: String,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// The envelope type is not a recognized command.
    #[error("unknown command type: {0}")]
    UnknownType(String),
}

impl Command {
    /// Decode a text frame into a command.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Envelope`] if the text is not an envelope,
    /// [`DecodeError::UnknownType`] for an unrecognized `type`, or
    /// [`DecodeError::Payload`] if the payload does not match the type.
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        let envelope: Envelope = serde_json::from_str(text).map_err(DecodeError::Envelope)?;
        Self::from_envelope(envelope)
    }

    /// Decode an already-parsed envelope.
    ///
    /// # Errors
    ///
    /// See [`Command::decode`].
    pub fn from_envelope(envelope: Envelope) -> Result<Self, DecodeError> {
        let Envelope { kind, payload } = envelope;
        let decoded = if kind == SET_PUMP_MODE {
            serde_json::from_value(payload).map(Self::SetPumpMode)
        } else if kind == SET_PUMP_STATE {
            serde_json::from_value(payload).map(Self::SetPumpState)
        } else {
            return Err(DecodeError::UnknownType(kind));
        };
        decoded.map_err(|source| DecodeError::Payload { kind, source })
    }

    /// The envelope type this command travels under.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::SetPumpMode(_) => SET_PUMP_MODE,
            Self::SetPumpState(_) => SET_PUMP_STATE,
        }
    }

    /// The pump this command targets.
    pub fn pump_id(&self) -> &str {
        match self {
            Self::SetPumpMode(p) => &p.id,
            Self::SetPumpState(p) => &p.id,
        }
    }

    /// Encode the command as a wire envelope.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] if the payload cannot be serialized.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        let payload = match self {
            Self::SetPumpMode(p) => serde_json::to_value(p)?,
            Self::SetPumpState(p) => serde_json::to_value(p)?,
        };
        serde_json::to_string(&Envelope {
            kind: self.kind().to_owned(),
            payload,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn decodes_set_pump_mode() {
        let json = r#"{"type":"SET_PUMP_MODE","payload":{"id":"PUMP_1","pumpMode":"MANUAL"}}"#;
        let cmd = Command::decode(json).unwrap();
        assert_eq!(
            cmd,
            Command::SetPumpMode(SetPumpModePayload {
                id: "PUMP_1".to_owned(),
                mode: PumpMode::Manual,
            })
        );
        assert_eq!(cmd.pump_id(), "PUMP_1");
    }

    #[test]
    fn decodes_set_pump_state() {
        let cmd =
            Command::decode(r#"{"type":"SET_PUMP_STATE","payload":{"id":"PUMP_2","on":true}}"#)
                .unwrap();
        assert_eq!(cmd.kind(), SET_PUMP_STATE);
        assert_eq!(
            cmd,
            Command::SetPumpState(SetPumpStatePayload {
                id: "PUMP_2".to_owned(),
                on: true,
            })
        );
    }

    #[test]
    fn ignores_extra_payload_fields() {
        let cmd = Command::decode(
            r#"{"type":"SET_PUMP_STATE","payload":{"id":"PUMP_2","on":false,"flow":3.2}}"#,
        );
        assert!(cmd.is_ok());
    }

    #[test]
    fn rejects_non_json_frame() {
        let err = Command::decode("not json at all").unwrap_err();
        assert!(matches!(err, DecodeError::Envelope(_)));
    }

    #[test]
    fn rejects_envelope_without_type() {
        let err = Command::decode(r#"{"payload":{}}"#).unwrap_err();
        assert!(matches!(err, DecodeError::Envelope(_)));
    }

    #[test]
    fn rejects_unknown_type() {
        let err = Command::decode(r#"{"type":"OPEN_VALVE","payload":{"id":"V1"}}"#).unwrap_err();
        assert!(matches!(err, DecodeError::UnknownType(ref k) if k == "OPEN_VALVE"));
    }

    #[test]
    fn rejects_payload_of_wrong_shape() {
        let json = r#"{"type":"SET_PUMP_STATE","payload":{"id":"PUMP_2","on":"yes"}}"#;
        let err = Command::decode(json).unwrap_err();
        assert!(matches!(err, DecodeError::Payload { ref kind, .. } if kind == SET_PUMP_STATE));
    }

    #[test]
    fn rejects_missing_payload() {
        let err = Command::decode(r#"{"type":"SET_PUMP_MODE"}"#).unwrap_err();
        assert!(matches!(err, DecodeError::Payload { .. }));
    }

    #[test]
    fn rejects_unknown_pump_mode() {
        let err = Command::decode(
            r#"{"type":"SET_PUMP_MODE","payload":{"id":"PUMP_1","pumpMode":"TURBO"}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, DecodeError::Payload { .. }));
    }

    #[test]
    fn encode_produces_decodable_envelope() {
        let cmd = Command::SetPumpMode(SetPumpModePayload {
            id: "PUMP_1".to_owned(),
            mode: PumpMode::Auto,
        });
        let text = cmd.encode().unwrap();
        assert!(text.contains(r#""type":"SET_PUMP_MODE""#));
        assert!(text.contains(r#""pumpMode":"AUTO""#));
        assert_eq!(Command::decode(&text).unwrap(), cmd);
    }
}
