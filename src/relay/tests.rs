use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use super::*;
use crate::client::memory::MemoryModuleClient;
use crate::client::{MessageHandler, ModuleClient, TwinPatchHandler};
use crate::config::RelaySettings;
use crate::message::{ModuleMessage, TwinPatch};
use crate::utils::{ClientError, RelayError};

fn as_dyn(client: &Arc<MemoryModuleClient>) -> Arc<dyn ModuleClient> {
    client.clone()
}

fn sent_values(client: &MemoryModuleClient) -> Vec<Value> {
    client
        .sent()
        .iter()
        .map(|m| serde_json::from_slice(&m.body).unwrap())
        .collect()
}

#[tokio::test]
async fn test_queue_is_fifo() {
    let (producer, mut queue) = outbound_queue::<u32>();
    let cancel = CancellationToken::new();
    for i in 0..5 {
        producer.enqueue(i).unwrap();
    }
    assert_eq!(queue.len(), 5);
    for i in 0..5 {
        assert_eq!(queue.next(&cancel).await, Some(i));
    }
    assert!(queue.is_empty());
}

#[tokio::test]
async fn test_queue_wait_is_interrupted_by_cancellation() {
    let (_producer, mut queue) = outbound_queue::<u32>();
    let cancel = CancellationToken::new();

    let waiter = {
        let cancel = cancel.clone();
        tokio::spawn(async move { queue.next(&cancel).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    cancel.cancel();

    let result = tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .expect("wait was not interrupted")
        .unwrap();
    assert_eq!(result, None);
}

#[tokio::test]
async fn test_queue_accepts_items_from_plain_threads() {
    let (producer, mut queue) = outbound_queue::<String>();
    let cancel = CancellationToken::new();

    let handle = std::thread::spawn(move || {
        producer.enqueue("from thread".to_string()).unwrap();
    });
    handle.join().unwrap();

    assert_eq!(queue.next(&cancel).await.as_deref(), Some("from thread"));
    // The only producer is gone.
    assert_eq!(queue.next(&cancel).await, None);
}

#[tokio::test]
async fn test_enqueue_after_consumer_dropped_returns_item() {
    let (producer, queue) = outbound_queue::<u32>();
    drop(queue);
    let err = producer.enqueue(7).unwrap_err();
    assert_eq!(err.0, 7);
    assert_eq!(err.to_string(), "outbound queue is closed");
}

#[tokio::test]
async fn test_relay_sends_in_enqueue_order() {
    let client = MemoryModuleClient::new();
    let (producer, queue) = outbound_queue::<Value>();
    let cancel = CancellationToken::new();

    let items = vec![json!({"a": 1}), json!({"b": [1, 2]}), json!("c")];
    for item in &items {
        producer.enqueue(item.clone()).unwrap();
    }

    let relay = tokio::spawn(run_relay_loop(
        as_dyn(&client),
        queue,
        cancel.clone(),
        RelaySettings::default(),
    ));

    assert!(client.wait_for_sends(3, Duration::from_secs(1)).await);
    cancel.cancel();
    relay.await.unwrap().unwrap();

    assert_eq!(sent_values(&client), items);
    for message in client.sent() {
        assert_eq!(message.output_name.as_deref(), Some(OUTPUT_CHANNEL));
        assert_eq!(message.content_type.as_deref(), Some("application/json"));
    }
}

#[tokio::test]
async fn test_relay_serializes_temperature_reading() {
    let client = MemoryModuleClient::new();
    let (producer, queue) = outbound_queue::<Value>();
    let cancel = CancellationToken::new();
    producer.enqueue(json!({"temp": 21.5})).unwrap();

    let relay = tokio::spawn(run_relay_loop(
        as_dyn(&client),
        queue,
        cancel.clone(),
        RelaySettings::default(),
    ));
    assert!(client.wait_for_sends(1, Duration::from_secs(1)).await);
    cancel.cancel();
    relay.await.unwrap().unwrap();

    let sent = client.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].body_text(), Some("{\"temp\": 21.5}"));
}

#[test]
fn test_payload_uses_spaced_separators() {
    let text = outbound::encode_payload(&json!({"a": [1, 2, {"b": null}], "c": "x"})).unwrap();
    assert_eq!(text, "{\"a\": [1, 2, {\"b\": null}], \"c\": \"x\"}");

    assert_eq!(outbound::encode_payload(&json!([])).unwrap(), "[]");
    assert_eq!(outbound::encode_payload(&json!({})).unwrap(), "{}");
}

#[test]
fn test_payload_escapes_non_ascii() {
    let text = outbound::encode_payload(&json!({"city": "Zürich \"HQ\"", "icon": "🌡"})).unwrap();
    assert_eq!(
        text,
        "{\"city\": \"Z\\u00fcrich \\\"HQ\\\"\", \"icon\": \"\\ud83c\\udf21\"}"
    );
}

#[tokio::test]
async fn test_relay_send_failure_ends_loop() {
    let client = MemoryModuleClient::new();
    client.fail_sends(true);
    let (producer, queue) = outbound_queue::<Value>();
    producer.enqueue(json!(1)).unwrap();
    producer.enqueue(json!(2)).unwrap();

    let result = run_relay_loop(
        as_dyn(&client),
        queue,
        CancellationToken::new(),
        RelaySettings::default(),
    )
    .await;

    assert!(matches!(
        result,
        Err(RelayError::Send {
            output: "output1",
            source: ClientError::ConnectionClosed
        })
    ));
    assert!(client.sent().is_empty());
}

#[tokio::test]
async fn test_relay_ends_when_producers_are_dropped() {
    let client = MemoryModuleClient::new();
    let (producer, queue) = outbound_queue::<Value>();
    producer.enqueue(json!("last")).unwrap();
    drop(producer);

    run_relay_loop(
        as_dyn(&client),
        queue,
        CancellationToken::new(),
        RelaySettings::default(),
    )
    .await
    .unwrap();

    assert_eq!(sent_values(&client), vec![json!("last")]);
}

#[tokio::test]
async fn test_cancellation_discards_queued_items_by_default() {
    let client = MemoryModuleClient::new();
    let (producer, queue) = outbound_queue::<Value>();
    let cancel = CancellationToken::new();
    producer.enqueue(json!(1)).unwrap();
    producer.enqueue(json!(2)).unwrap();
    cancel.cancel();

    run_relay_loop(as_dyn(&client), queue, cancel, RelaySettings::default())
        .await
        .unwrap();

    assert!(client.sent().is_empty());
}

#[tokio::test]
async fn test_cancellation_drains_when_configured() {
    let client = MemoryModuleClient::new();
    let (producer, queue) = outbound_queue::<Value>();
    let cancel = CancellationToken::new();
    producer.enqueue(json!(1)).unwrap();
    producer.enqueue(json!(2)).unwrap();
    cancel.cancel();

    run_relay_loop(
        as_dyn(&client),
        queue,
        cancel,
        RelaySettings {
            drain_on_shutdown: true,
        },
    )
    .await
    .unwrap();

    assert_eq!(sent_values(&client), vec![json!(1), json!(2)]);
}

#[tokio::test]
async fn test_in_flight_send_completes_after_cancellation() {
    let client = MemoryModuleClient::new();
    client.delay_sends(Duration::from_millis(100));
    let (producer, queue) = outbound_queue::<Value>();
    let cancel = CancellationToken::new();
    producer.enqueue(json!("slow")).unwrap();

    let relay = tokio::spawn(run_relay_loop(
        as_dyn(&client),
        queue,
        cancel.clone(),
        RelaySettings::default(),
    ));
    tokio::time::sleep(Duration::from_millis(20)).await;
    cancel.cancel();
    relay.await.unwrap().unwrap();

    assert_eq!(sent_values(&client), vec![json!("slow")]);
}

#[tokio::test]
async fn test_inbound_forwards_input1_unchanged() {
    let client = MemoryModuleClient::new();
    let handler = InboundHandler::new(&as_dyn(&client));
    let message = ModuleMessage::new(b"reading".to_vec())
        .with_property("alert", "true")
        .with_input_name(INPUT_CHANNEL);

    handler.handle_message(message.clone()).await;

    let sent = client.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].body, message.body);
    assert_eq!(sent[0].custom_properties, message.custom_properties);
    assert_eq!(sent[0].output_name.as_deref(), Some(OUTPUT_CHANNEL));
}

#[tokio::test]
async fn test_inbound_discards_other_inputs() {
    let client = MemoryModuleClient::new();
    let handler = InboundHandler::new(&as_dyn(&client));

    handler
        .handle_message(ModuleMessage::new(b"ignore".to_vec()).with_input_name("input2"))
        .await;
    handler
        .handle_message(ModuleMessage::new(b"no input".to_vec()))
        .await;

    assert!(client.sent().is_empty());
}

#[tokio::test]
async fn test_inbound_forward_failure_is_contained() {
    let client = MemoryModuleClient::new();
    client.fail_sends(true);
    let handler = InboundHandler::new(&as_dyn(&client));

    // Should not panic
    handler
        .handle_message(ModuleMessage::new(b"x".to_vec()).with_input_name(INPUT_CHANNEL))
        .await;
    assert!(client.sent().is_empty());
}

#[tokio::test]
async fn test_inbound_drops_message_after_client_released() {
    let client: Arc<dyn ModuleClient> = MemoryModuleClient::new();
    let handler = InboundHandler::new(&client);
    drop(client);

    // Should not panic
    handler
        .handle_message(ModuleMessage::new(b"x".to_vec()).with_input_name(INPUT_CHANNEL))
        .await;
}

#[tokio::test]
async fn test_twin_patch_never_sends_or_touches_queue() {
    let client = MemoryModuleClient::new();
    let handler = InboundHandler::new(&as_dyn(&client));
    let (producer, queue) = outbound_queue::<Value>();
    producer.enqueue(json!("pending")).unwrap();

    handler
        .handle_twin_patch(TwinPatch::new(json!({"interval": 10, "$version": 3})))
        .await;

    assert!(client.sent().is_empty());
    assert_eq!(queue.len(), 1);
}

#[tokio::test]
async fn test_ingest_enqueues_valid_lines() {
    let input: &[u8] = b"{\"temp\": 21.5}\n\nnot json\n[1,2]\n";
    let (producer, mut queue) = outbound_queue::<Value>();
    let cancel = CancellationToken::new();

    let count = ingest_json_lines(input, producer).await.unwrap();

    assert_eq!(count, 2);
    assert_eq!(queue.next(&cancel).await, Some(json!({"temp": 21.5})));
    assert_eq!(queue.next(&cancel).await, Some(json!([1, 2])));
    assert_eq!(queue.next(&cancel).await, None);
}

#[tokio::test]
async fn test_ingest_stops_when_queue_closed() {
    let input: &[u8] = b"1\n2\n";
    let (producer, queue) = outbound_queue::<Value>();
    drop(queue);

    let count = ingest_json_lines(input, producer).await.unwrap();
    assert_eq!(count, 0);
}
