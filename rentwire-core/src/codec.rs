//! Codec for channel envelopes
//!
//! Frames are JSON text. Decoding is strict about shape (an object with a
//! string `type`) and lenient about everything else: unknown fields are
//! ignored so a newer server can add metadata without breaking older clients.
//!
//! Decode failures are reported as [`Error::Decode`]. The connection manager
//! logs and drops such frames; they never close the channel.
//!
//! # Examples
//!
//! ```rust
//! use rentwire_core::{codec, Envelope};
//!
//! let text = codec::encode(&Envelope::new("rent_due")).unwrap();
//! assert_eq!(text, r#"{"type":"rent_due"}"#);
//!
//! assert!(codec::decode("not json").is_err());
//! ```

use crate::envelope::Envelope;
use crate::error::{Error, Result};

/// Encode an envelope to JSON text
///
/// # Errors
///
/// Returns `Error::Serialization` if the payload cannot be represented as JSON.
pub fn encode(envelope: &Envelope) -> Result<String> {
    Ok(serde_json::to_string(envelope)?)
}

/// Decode JSON text into an envelope
///
/// # Errors
///
/// Returns `Error::Decode` if the text is not valid JSON, is not an object,
/// or lacks a string `type` field.
pub fn decode(text: &str) -> Result<Envelope> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| Error::Decode(e.to_string()))?;

    if !value.is_object() {
        return Err(Error::Decode("envelope must be a JSON object".to_string()));
    }

    serde_json::from_value(value).map_err(|e| Error::Decode(e.to_string()))
}
