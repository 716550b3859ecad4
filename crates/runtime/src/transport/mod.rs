//! Length-prefixed JSON framing over any async byte stream.
//!
//! Each frame is a 4-byte little-endian length followed by that many bytes of
//! JSON. [`FrameTransport`] splits into a [`FrameSender`], used by the writer
//! task, and a [`FrameReceiver`] whose [`run`](FrameReceiver::run) loop
//! forwards every decoded frame to an unbounded channel.

use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::error::{Error, Result};

/// Largest frame accepted from a peer.
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// Bidirectional frame transport over a writer/reader pair.
pub struct FrameTransport<W, R> {
	sender: FrameSender<W>,
	receiver: FrameReceiver<R>,
}

impl<W, R> FrameTransport<W, R>
where
	W: AsyncWrite + Unpin + Send,
	R: AsyncRead + Unpin + Send,
{
	/// Creates a transport and the channel its receiver half feeds.
	pub fn new(writer: W, reader: R) -> (Self, mpsc::UnboundedReceiver<Value>) {
		let (message_tx, message_rx) = mpsc::unbounded_channel();
		let transport = Self {
			sender: FrameSender { writer },
			receiver: FrameReceiver { reader, message_tx },
		};
		(transport, message_rx)
	}

	/// Splits into the halves owned by the writer and reader tasks.
	pub fn into_parts(self) -> (FrameSender<W>, FrameReceiver<R>) {
		(self.sender, self.receiver)
	}

	/// Runs the receive loop in place (used by tests).
	pub async fn run(&mut self) -> Result<()> {
		self.receiver.run().await
	}
}

/// Writing half of a [`FrameTransport`].
pub struct FrameSender<W> {
	writer: W,
}

impl<W: AsyncWrite + Unpin + Send> FrameSender<W> {
	/// Encodes and writes one frame.
	pub async fn send(&mut self, message: Value) -> Result<()> {
		let bytes = serde_json::to_vec(&message)?;
		let length = u32::try_from(bytes.len())
			.map_err(|_| Error::TransportError(format!("Frame too large: {} bytes", bytes.len())))?;

		self.writer
			.write_all(&length.to_le_bytes())
			.await
			.map_err(|e| Error::TransportError(format!("Failed to write length prefix: {e}")))?;
		self.writer
			.write_all(&bytes)
			.await
			.map_err(|e| Error::TransportError(format!("Failed to write frame: {e}")))?;
		self.writer
			.flush()
			.await
			.map_err(|e| Error::TransportError(format!("Failed to flush frame: {e}")))?;
		Ok(())
	}
}

/// Reading half of a [`FrameTransport`].
pub struct FrameReceiver<R> {
	reader: R,
	message_tx: mpsc::UnboundedSender<Value>,
}

impl<R: AsyncRead + Unpin + Send> FrameReceiver<R> {
	/// Reads frames until the peer closes the stream.
	///
	/// Returns `Ok(())` on EOF at a frame boundary or when nobody listens to
	/// the channel any more, and an error for truncated or oversized frames.
	pub async fn run(&mut self) -> Result<()> {
		loop {
			let mut len_buf = [0u8; 4];
			let mut filled = 0;
			while filled < len_buf.len() {
				let n = self
					.reader
					.read(&mut len_buf[filled..])
					.await
					.map_err(|e| Error::TransportError(format!("Failed to read length prefix: {e}")))?;
				if n == 0 {
					if filled == 0 {
						return Ok(());
					}
					return Err(Error::TransportError(
						"Failed to read length prefix: stream closed mid-frame".to_string(),
					));
				}
				filled += n;
			}

			let length = u32::from_le_bytes(len_buf) as usize;
			if length > MAX_FRAME_LEN {
				return Err(Error::TransportError(format!(
					"Frame of {length} bytes exceeds limit of {MAX_FRAME_LEN}"
				)));
			}

			let mut frame = vec![0u8; length];
			self.reader
				.read_exact(&mut frame)
				.await
				.map_err(|e| Error::TransportError(format!("Failed to read frame body: {e}")))?;

			let message: Value = serde_json::from_slice(&frame)?;
			if self.message_tx.send(message).is_err() {
				return Ok(());
			}
		}
	}
}

#[cfg(test)]
mod tests;
