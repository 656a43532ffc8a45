use std::time::Duration;

use tokio::io::duplex;
use waldo_protocol::ops::{method, GetVersionRequest, VersionReply};
use waldo_protocol::ErrorPayload;

use super::*;
use crate::transport;

fn test_connection() -> Arc<Connection> {
	let (_peer_read, our_write) = duplex(1024);
	let (our_read, _peer_write) = duplex(1024);
	let (_transport, sender, inbound) = PipeTransport::new(our_read, our_write);
	Connection::new(sender, inbound)
}

#[test]
fn request_ids_start_at_one_and_increment() {
	let connection = test_connection();

	let first = connection.last_id.fetch_add(1, Ordering::SeqCst) + 1;
	let second = connection.last_id.fetch_add(1, Ordering::SeqCst) + 1;

	assert_eq!(first, 1);
	assert_eq!(second, 2);
}

#[tokio::test]
async fn response_resolves_waiting_caller() {
	let connection = test_connection();

	let (tx, rx) = oneshot::channel();
	connection.pending.insert(7, tx);

	connection.dispatch(Message::Response(Response {
		id: 7,
		result: Some(serde_json::json!({"status": "ok"})),
		error: None,
	}));

	let response = rx.await.unwrap();
	assert_eq!(response.result.unwrap()["status"], "ok");
	assert!(connection.pending.is_empty());
}

#[test]
fn response_for_unknown_id_is_dropped() {
	let connection = test_connection();

	// Must not panic or leave state behind.
	connection.dispatch(Message::Response(Response {
		id: 999,
		result: None,
		error: None,
	}));

	assert!(connection.pending.is_empty());
}

#[tokio::test]
async fn events_route_to_their_subscription() {
	let connection = test_connection();

	let mut click = connection.subscribe_events("event@1");
	let mut toggle = connection.subscribe_events("event@2");

	connection.dispatch(Message::Event(Event {
		subscription: "event@2".to_owned(),
		event: "Toggled".to_owned(),
		args: serde_json::json!({}),
	}));

	let pushed = toggle.recv().await.unwrap();
	assert_eq!(pushed.event, "Toggled");
	assert!(click.try_recv().is_err());
}

#[test]
fn dropped_subscriber_is_pruned_on_next_push() {
	let connection = test_connection();

	let rx = connection.subscribe_events("event@1");
	drop(rx);

	connection.dispatch(Message::Event(Event {
		subscription: "event@1".to_owned(),
		event: "Click".to_owned(),
		args: serde_json::json!({}),
	}));

	assert!(connection.subscriptions.is_empty());
}

#[tokio::test]
async fn request_resolves_with_typed_reply() {
	let (host_read, our_write) = duplex(4096);
	let (our_read, host_write) = duplex(4096);

	let (pump, sender, inbound) = PipeTransport::new(our_read, our_write);
	tokio::spawn(pump.run());
	let connection = Connection::new(sender, inbound);
	tokio::spawn(connection.clone().run());

	// Stand-in host: answers getVersion, rejects everything else.
	tokio::spawn(async move {
		let mut reader = host_read;
		let mut writer = host_write;
		while let Ok(Some(Message::Request(request))) = transport::read_message(&mut reader).await {
			let response = if request.method == method::GET_VERSION {
				Response {
					id: request.id,
					result: Some(serde_json::json!({
						"hostVersion": "0.3.0",
						"appVersion": "1.2.3",
					})),
					error: None,
				}
			} else {
				Response {
					id: request.id,
					result: None,
					error: Some(ErrorPayload::new(format!(
						"Unknown method '{}'",
						request.method
					))),
				}
			};
			transport::write_message(&mut writer, &Message::Response(response))
				.await
				.unwrap();
		}
	});

	let reply: VersionReply = connection
		.request(method::GET_VERSION, &GetVersionRequest::default())
		.await
		.unwrap();
	assert_eq!(reply.host_version, "0.3.0");
	assert_eq!(reply.app_version, "1.2.3");

	let err = connection
		.request::<_, VersionReply>("bogusMethod", &GetVersionRequest::default())
		.await
		.unwrap_err();
	match err {
		Error::Remote { message, .. } => assert!(message.contains("bogusMethod")),
		other => panic!("expected a remote error, got {other:?}"),
	}
}

#[tokio::test]
async fn transport_eof_fails_outstanding_requests() {
	let (peer_read, our_write) = duplex(1024);
	let (our_read, peer_write) = duplex(1024);

	let (pump, sender, inbound) = PipeTransport::new(our_read, our_write);
	tokio::spawn(pump.run());
	let connection = Connection::new(sender, inbound);
	let run = tokio::spawn(connection.clone().run());

	let waiting = tokio::spawn({
		let connection = connection.clone();
		async move {
			connection
				.request::<_, serde_json::Value>(method::GET_VERSION, &GetVersionRequest::default())
				.await
		}
	});

	// Let the request hit the wire, then close the host end of the stream.
	tokio::time::sleep(Duration::from_millis(50)).await;
	drop(peer_read);
	drop(peer_write);

	let err = waiting.await.unwrap().unwrap_err();
	assert!(matches!(err, Error::ChannelClosed));

	run.await.unwrap();
	assert!(connection.is_closed());

	let err = connection
		.request::<_, serde_json::Value>(method::GET_VERSION, &GetVersionRequest::default())
		.await
		.unwrap_err();
	assert!(matches!(err, Error::ChannelClosed));
}
