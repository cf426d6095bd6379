//! Edge hub wire frames
//!
//! Every frame is a JSON text message tagged by `type`. Sends are correlated
//! with their outcome through `seq`.

use serde::{Deserialize, Serialize};

use crate::message::{ModuleMessage, TwinPatch};

/// Frames written by the module.
#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum ModuleFrame {
    #[serde(rename = "hello")]
    Hello { device_id: String, module_id: String },
    #[serde(rename = "send_to_output")]
    SendToOutput {
        seq: u64,
        output: String,
        message: ModuleMessage,
    },
    #[serde(rename = "goodbye")]
    Goodbye {},
}

/// Frames written by the edge hub.
#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum HubFrame {
    #[serde(rename = "input_message")]
    InputMessage {
        input: String,
        message: ModuleMessage,
    },
    #[serde(rename = "twin_patch")]
    TwinPatch { patch: TwinPatch },
    #[serde(rename = "send_ack")]
    SendAck { seq: u64 },
    #[serde(rename = "send_rejected")]
    SendRejected { seq: u64, reason: String },
}
