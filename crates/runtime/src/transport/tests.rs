use tokio::io::{AsyncReadExt, AsyncWriteExt};

use super::*;

async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, message: &Value) {
	let bytes = serde_json::to_vec(message).unwrap();
	writer.write_all(&(bytes.len() as u32).to_le_bytes()).await.unwrap();
	writer.write_all(&bytes).await.unwrap();
	writer.flush().await.unwrap();
}

#[tokio::test]
async fn test_send_writes_le_length_prefix() {
	let (mut peer_read, local_write) = tokio::io::duplex(1024);
	let (local_read, _peer_write) = tokio::io::duplex(1024);

	let (transport, _rx) = FrameTransport::new(local_write, local_read);
	let (mut sender, _receiver) = transport.into_parts();

	let message = serde_json::json!({"id": 1, "object": "tc", "method": "__resolve__"});
	sender.send(message.clone()).await.unwrap();

	let mut len_buf = [0u8; 4];
	peer_read.read_exact(&mut len_buf).await.unwrap();
	let length = u32::from_le_bytes(len_buf) as usize;

	let mut body = vec![0u8; length];
	peer_read.read_exact(&mut body).await.unwrap();
	let received: Value = serde_json::from_slice(&body).unwrap();
	assert_eq!(received, message);
}

#[tokio::test]
async fn test_multiple_frames_in_sequence() {
	let (_peer_read, local_write) = tokio::io::duplex(4096);
	let (local_read, mut peer_write) = tokio::io::duplex(4096);

	let (mut transport, mut rx) = FrameTransport::new(local_write, local_read);
	let read_task = tokio::spawn(async move { transport.run().await });

	let messages = vec![
		serde_json::json!({"id": 1, "result": "first"}),
		serde_json::json!({"id": 2, "result": "second"}),
		serde_json::json!({"id": 3, "result": "third"}),
	];
	for msg in &messages {
		write_frame(&mut peer_write, msg).await;
	}

	for expected in &messages {
		let received = rx.recv().await.unwrap();
		assert_eq!(&received, expected);
	}

	drop(peer_write);
	assert!(read_task.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_large_frame() {
	let (_peer_read, local_write) = tokio::io::duplex(1024 * 1024);
	let (local_read, mut peer_write) = tokio::io::duplex(1024 * 1024);

	let (mut transport, mut rx) = FrameTransport::new(local_write, local_read);
	let read_task = tokio::spawn(async move { transport.run().await });

	let large_message = serde_json::json!({"id": 1, "result": "x".repeat(100_000)});
	write_frame(&mut peer_write, &large_message).await;

	assert_eq!(rx.recv().await.unwrap(), large_message);

	drop(peer_write);
	let _ = read_task.await;
}

#[tokio::test]
async fn test_truncated_length_prefix() {
	let (_peer_read, local_write) = tokio::io::duplex(1024);
	let (local_read, mut peer_write) = tokio::io::duplex(1024);

	let (mut transport, _rx) = FrameTransport::new(local_write, local_read);

	peer_write.write_all(&[0x01, 0x02]).await.unwrap();
	peer_write.flush().await.unwrap();
	drop(peer_write);

	let result = transport.run().await;
	assert!(result.unwrap_err().to_string().contains("Failed to read length prefix"));
}

#[tokio::test]
async fn test_oversized_frame_is_rejected() {
	let (_peer_read, local_write) = tokio::io::duplex(1024);
	let (local_read, mut peer_write) = tokio::io::duplex(1024);

	let (mut transport, _rx) = FrameTransport::new(local_write, local_read);

	peer_write.write_all(&u32::MAX.to_le_bytes()).await.unwrap();
	peer_write.flush().await.unwrap();

	let result = transport.run().await;
	assert!(result.unwrap_err().to_string().contains("exceeds limit"));
}

#[tokio::test]
async fn test_clean_close_between_frames() {
	let (_peer_read, local_write) = tokio::io::duplex(1024);
	let (local_read, peer_write) = tokio::io::duplex(1024);

	let (mut transport, _rx) = FrameTransport::new(local_write, local_read);
	drop(peer_write);

	assert!(transport.run().await.is_ok());
}
