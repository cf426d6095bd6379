//! Outbound relay loop
//!
//! Runs for the lifetime of the process. The only suspension point besides the
//! send itself is the wait on the queue, which is interrupted by cancellation.
//! A send that is already in flight when cancellation fires is allowed to
//! finish. Send failures are logged and end the loop; there is no retry.

use std::io;
use std::sync::Arc;

use serde::Serialize;
use serde_json::ser::Formatter;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::client::ModuleClient;
use crate::config::RelaySettings;
use crate::message::ModuleMessage;
use crate::relay::OUTPUT_CHANNEL;
use crate::relay::queue::OutboundQueue;
use crate::utils::RelayError;

pub async fn run_relay_loop<T: Serialize>(
    client: Arc<dyn ModuleClient>,
    mut queue: OutboundQueue<T>,
    cancel: CancellationToken,
    settings: RelaySettings,
) -> Result<(), RelayError> {
    info!(output = OUTPUT_CHANNEL, "outbound relay started");

    while let Some(item) = queue.next(&cancel).await {
        let text = encode_payload(&item)?;
        send_payload(client.as_ref(), text).await?;
    }

    if !cancel.is_cancelled() {
        info!("all producers gone, outbound relay stopped");
        return Ok(());
    }

    if settings.drain_on_shutdown {
        let mut drained = 0usize;
        while let Some(item) = queue.try_next() {
            let text = encode_payload(&item)?;
            send_payload(client.as_ref(), text).await?;
            drained += 1;
        }
        info!(drained, "outbound queue drained before shutdown");
    } else if !queue.is_empty() {
        warn!(discarded = queue.len(), "discarding queued payloads on shutdown");
    }

    info!("outbound relay stopped");
    Ok(())
}

/// Writes `": "` and `", "` separators and escapes non-ASCII text as `\uXXXX`,
/// the JSON text the cloud side of the module expects.
struct SpacedFormatter;

impl Formatter for SpacedFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if fragment.is_ascii() {
            return writer.write_all(fragment.as_bytes());
        }
        let mut units = [0u16; 2];
        for ch in fragment.chars() {
            if ch.is_ascii() {
                writer.write_all(&[ch as u8])?;
            } else {
                for unit in ch.encode_utf16(&mut units) {
                    write!(writer, "\\u{:04x}", unit)?;
                }
            }
        }
        Ok(())
    }
}

pub(crate) fn encode_payload<T: Serialize + ?Sized>(item: &T) -> Result<String, serde_json::Error> {
    let mut buf = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, SpacedFormatter);
    item.serialize(&mut serializer)?;
    String::from_utf8(buf).map_err(|e| serde_json::Error::io(io::Error::new(io::ErrorKind::InvalidData, e)))
}

async fn send_payload(client: &dyn ModuleClient, text: String) -> Result<(), RelayError> {
    debug!(payload = %text, "sending message to {}", OUTPUT_CHANNEL);

    client
        .send_message_to_output(ModuleMessage::from_json_text(text), OUTPUT_CHANNEL)
        .await
        .map_err(|source| {
            error!(error = %source, output = OUTPUT_CHANNEL, "unexpected error sending queued message");
            RelayError::Send {
                output: OUTPUT_CHANNEL,
                source,
            }
        })
}
