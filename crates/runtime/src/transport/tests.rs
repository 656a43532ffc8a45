use tokio::io::{AsyncReadExt, AsyncWriteExt};
use waldo_protocol::{Message, Request, Response};

use super::*;

fn request(id: u32, method: &str) -> Message {
	Message::Request(Request {
		id,
		method: method.to_owned(),
		params: serde_json::json!({}),
	})
}

async fn write_raw_frame<W: AsyncWrite + Unpin>(writer: &mut W, json: &serde_json::Value) {
	let payload = serde_json::to_vec(json).unwrap();
	writer
		.write_all(&(payload.len() as u32).to_le_bytes())
		.await
		.unwrap();
	writer.write_all(&payload).await.unwrap();
	writer.flush().await.unwrap();
}

#[test]
fn frame_layout_is_little_endian_prefix_plus_json() {
	let json = serde_json::json!({"id": 1, "method": "getVersion", "params": {}});
	let payload = serde_json::to_vec(&json).unwrap();
	let length = payload.len() as u32;

	let mut frame = Vec::new();
	frame.extend_from_slice(&length.to_le_bytes());
	frame.extend_from_slice(&payload);

	assert_eq!(frame.len(), 4 + payload.len());
	assert_eq!(frame[0], (length & 0xFF) as u8);
	assert_eq!(frame[1], ((length >> 8) & 0xFF) as u8);
	assert_eq!(u32::from_le_bytes([frame[0], frame[1], frame[2], frame[3]]), length);
}

#[tokio::test]
async fn queued_frames_reach_the_peer_in_order() {
	let (mut peer_read, our_write) = tokio::io::duplex(4096);
	let (our_read, _peer_write) = tokio::io::duplex(4096);

	let (transport, sender, _inbound) = PipeTransport::new(our_read, our_write);
	let pump = tokio::spawn(transport.run());

	sender.send(request(1, "getVersion")).unwrap();
	sender.send(request(2, "getWindows")).unwrap();

	for expected_id in [1u32, 2] {
		let mut len_buf = [0u8; 4];
		peer_read.read_exact(&mut len_buf).await.unwrap();
		let mut payload = vec![0u8; u32::from_le_bytes(len_buf) as usize];
		peer_read.read_exact(&mut payload).await.unwrap();

		let frame: serde_json::Value = serde_json::from_slice(&payload).unwrap();
		assert_eq!(frame["id"], expected_id);
	}

	drop(sender);
	drop(_inbound);
	pump.await.unwrap().unwrap();
}

#[tokio::test]
async fn incoming_frames_are_delivered() {
	let (_peer_read, our_write) = tokio::io::duplex(4096);
	let (our_read, mut peer_write) = tokio::io::duplex(4096);

	let (transport, _sender, mut inbound) = PipeTransport::new(our_read, our_write);
	let pump = tokio::spawn(transport.run());

	for id in 1u32..=3 {
		write_raw_frame(&mut peer_write, &serde_json::json!({"id": id, "result": {}})).await;
	}

	for expected_id in 1u32..=3 {
		match inbound.recv().await.unwrap() {
			Message::Response(Response { id, .. }) => assert_eq!(id, expected_id),
			other => panic!("expected a response frame, got {other:?}"),
		}
	}

	drop(peer_write);
	drop(inbound);
	let _ = pump.await.unwrap();
}

#[tokio::test]
async fn large_frames_survive_the_pump() {
	let (_peer_read, our_write) = tokio::io::duplex(1024 * 1024);
	let (our_read, mut peer_write) = tokio::io::duplex(1024 * 1024);

	let (transport, _sender, mut inbound) = PipeTransport::new(our_read, our_write);
	let pump = tokio::spawn(transport.run());

	let big = "x".repeat(100_000);
	let json = serde_json::json!({"id": 7, "result": {"data": big}});
	assert!(serde_json::to_vec(&json).unwrap().len() > 32_768);
	write_raw_frame(&mut peer_write, &json).await;

	match inbound.recv().await.unwrap() {
		Message::Response(response) => {
			let data = response.result.unwrap();
			assert_eq!(data["data"].as_str().unwrap().len(), 100_000);
		}
		other => panic!("expected a response frame, got {other:?}"),
	}

	drop(peer_write);
	drop(inbound);
	let _ = pump.await.unwrap();
}

#[tokio::test]
async fn truncated_length_prefix_is_an_error() {
	let (_peer_read, our_write) = tokio::io::duplex(1024);
	let (our_read, mut peer_write) = tokio::io::duplex(1024);

	let (transport, _sender, _inbound) = PipeTransport::new(our_read, our_write);

	// Two of the four prefix bytes, then EOF.
	peer_write.write_all(&[0x01, 0x02]).await.unwrap();
	peer_write.flush().await.unwrap();
	drop(peer_write);

	let err = transport.run().await.unwrap_err();
	assert!(err.to_string().contains("Failed to read length prefix"));
}

#[tokio::test]
async fn clean_close_at_frame_boundary_is_not_an_error() {
	let (_peer_read, our_write) = tokio::io::duplex(1024);
	let (our_read, mut peer_write) = tokio::io::duplex(1024);

	let (transport, _sender, mut inbound) = PipeTransport::new(our_read, our_write);
	let pump = tokio::spawn(transport.run());

	write_raw_frame(&mut peer_write, &serde_json::json!({"id": 1, "result": {}})).await;
	assert!(inbound.recv().await.is_some());

	drop(peer_write);
	pump.await.unwrap().unwrap();
}

#[tokio::test]
async fn absurd_length_prefix_is_rejected() {
	let (_peer_read, our_write) = tokio::io::duplex(1024);
	let (our_read, mut peer_write) = tokio::io::duplex(1024);

	let (transport, _sender, _inbound) = PipeTransport::new(our_read, our_write);

	peer_write.write_all(&u32::MAX.to_le_bytes()).await.unwrap();
	peer_write.flush().await.unwrap();

	let err = transport.run().await.unwrap_err();
	assert!(err.to_string().contains("exceeds"));
}
