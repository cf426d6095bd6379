use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A message routed through the edge hub.
///
/// The body is opaque bytes. Custom properties are application-defined string
/// pairs that travel with the message unchanged. The channel names are filled
/// in by the transport: `input_name` on receipt, `output_name` on send.
///
/// # Example
///
/// ```rust
/// use edge_relay::message::ModuleMessage;
///
/// let msg = ModuleMessage::new(b"{\"temp\":21.5}".to_vec()).with_property("alert", "true");
/// assert_eq!(msg.custom_properties["alert"], "true");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModuleMessage {
    #[serde(with = "body_base64")]
    pub body: Vec<u8>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub custom_properties: HashMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_encoding: Option<String>,

    /// Channel the message arrived on. Carried by the enclosing frame.
    #[serde(skip)]
    pub input_name: Option<String>,

    /// Channel the message is being sent to. Carried by the enclosing frame.
    #[serde(skip)]
    pub output_name: Option<String>,
}

impl ModuleMessage {
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: body.into(),
            ..Self::default()
        }
    }

    /// Wraps an already-serialized JSON document. Each message gets a fresh id.
    pub fn from_json_text(text: String) -> Self {
        Self {
            body: text.into_bytes(),
            message_id: Some(Uuid::new_v4().to_string()),
            content_type: Some("application/json".to_string()),
            content_encoding: Some("utf-8".to_string()),
            ..Self::default()
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_properties.insert(key.into(), value.into());
        self
    }

    pub fn with_input_name(mut self, input: impl Into<String>) -> Self {
        self.input_name = Some(input.into());
        self
    }

    /// The body as text, if it is valid UTF-8.
    pub fn body_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }

    /// Returns the message addressed to `output`. Nothing else changes.
    pub fn routed_to(mut self, output: &str) -> Self {
        self.output_name = Some(output.to_string());
        self
    }
}

mod body_base64 {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(body: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(body))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
