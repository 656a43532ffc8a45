//! Length-prefixed JSON framing over a byte stream.
//!
//! Every frame is a 4-byte little-endian payload length followed by that
//! many bytes of JSON. The same framing runs in both directions, and the
//! host side reuses [`read_message`] and [`write_message`] for its end of
//! the stream.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use waldo_protocol::Message;

use crate::error::{Error, Result};

/// Upper bound on a single frame; a larger prefix means a corrupt stream.
const MAX_FRAME_BYTES: u32 = 64 * 1024 * 1024;

/// Reads one frame, or `None` when the peer closed between frames.
///
/// A stream that ends partway through a prefix or payload is an error;
/// only a clean close at a frame boundary maps to `None`.
pub async fn read_message<R>(reader: &mut R) -> Result<Option<Message>>
where
	R: AsyncRead + Unpin,
{
	let mut len_buf = [0u8; 4];
	let mut filled = 0;
	while filled < len_buf.len() {
		let n = reader
			.read(&mut len_buf[filled..])
			.await
			.map_err(|err| Error::Transport(format!("Failed to read length prefix: {err}")))?;
		if n == 0 {
			if filled == 0 {
				return Ok(None);
			}
			return Err(Error::Transport(
				"Failed to read length prefix: unexpected end of stream".to_owned(),
			));
		}
		filled += n;
	}

	let length = u32::from_le_bytes(len_buf);
	if length > MAX_FRAME_BYTES {
		return Err(Error::Transport(format!(
			"Frame length {length} exceeds the {MAX_FRAME_BYTES} byte limit"
		)));
	}

	let mut payload = vec![0u8; length as usize];
	reader
		.read_exact(&mut payload)
		.await
		.map_err(|err| Error::Transport(format!("Failed to read frame payload: {err}")))?;
	Ok(Some(serde_json::from_slice(&payload)?))
}

/// Writes one frame and flushes it.
pub async fn write_message<W>(writer: &mut W, message: &Message) -> Result<()>
where
	W: AsyncWrite + Unpin,
{
	let payload = serde_json::to_vec(message)?;
	let length = u32::try_from(payload.len())
		.ok()
		.filter(|len| *len <= MAX_FRAME_BYTES)
		.ok_or_else(|| {
			Error::Transport(format!("Frame of {} bytes exceeds the frame limit", payload.len()))
		})?;
	writer.write_all(&length.to_le_bytes()).await?;
	writer.write_all(&payload).await?;
	writer.flush().await?;
	Ok(())
}

/// Queues frames for the write side of a [`PipeTransport`].
///
/// Sending never blocks; frames are written in order by the pump.
#[derive(Clone)]
pub struct TransportSender {
	tx: mpsc::UnboundedSender<Message>,
}

impl TransportSender {
	pub fn send(&self, message: Message) -> Result<()> {
		self.tx.send(message).map_err(|_| Error::ChannelClosed)
	}
}

/// Pumps frames between a pair of stream halves and in-process channels.
pub struct PipeTransport<R, W> {
	reader: R,
	writer: W,
	inbound: mpsc::UnboundedSender<Message>,
	outbound: mpsc::UnboundedReceiver<Message>,
}

impl<R, W> PipeTransport<R, W>
where
	R: AsyncRead + Unpin,
	W: AsyncWrite + Unpin,
{
	/// Builds a pump over the given halves. Returns the pump, a cloneable
	/// handle that queues outgoing frames, and the stream of incoming
	/// frames.
	pub fn new(reader: R, writer: W) -> (Self, TransportSender, mpsc::UnboundedReceiver<Message>) {
		let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
		let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
		let transport = Self {
			reader,
			writer,
			inbound: inbound_tx,
			outbound: outbound_rx,
		};
		(transport, TransportSender { tx: outbound_tx }, inbound_rx)
	}

	/// Drives both directions until the peer closes, a frame fails, or
	/// every [`TransportSender`] clone and the inbound receiver are gone.
	pub async fn run(self) -> Result<()> {
		let Self {
			mut reader,
			mut writer,
			inbound,
			mut outbound,
		} = self;

		let read = async {
			loop {
				match read_message(&mut reader).await? {
					Some(message) => {
						if inbound.send(message).is_err() {
							// Dispatcher hung up; nothing left to deliver to.
							break;
						}
					}
					None => break,
				}
			}
			Ok::<(), Error>(())
		};

		let write = async {
			while let Some(message) = outbound.recv().await {
				write_message(&mut writer, &message).await?;
			}
			Ok::<(), Error>(())
		};

		tokio::select! {
			result = read => result,
			result = write => result,
		}
	}
}

#[cfg(test)]
mod tests;
