//! Framing for the live sync channel (backend ↔ dashboard).
//!
//! Each frame is a length-prefixed JSON document. Self-contained: payload
//! types live in `sync::event`.

use bytes::Bytes;
use futures::{Sink, SinkExt, StreamExt};
use serde::{de::DeserializeOwned, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

/// Preview frames are JPEG in base64; leave plenty of headroom.
pub const MAX_FRAME_LENGTH: usize = 16 * 1024 * 1024; // 16MB

pub type MessageStream<S = TcpStream> = Framed<S, LengthDelimitedCodec>;

/// Create a framed message stream with length-delimited framing.
pub fn message_stream<S: AsyncRead + AsyncWrite>(stream: S) -> MessageStream<S> {
    let codec = LengthDelimitedCodec::builder()
        .max_frame_length(MAX_FRAME_LENGTH)
        .new_codec();
    Framed::new(stream, codec)
}

/// Send a serializable message (JSON + length prefix).
pub async fn send_message<S, T>(stream: &mut MessageStream<S>, msg: &T) -> anyhow::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
    T: Serialize,
{
    send_to_sink(stream, msg).await
}

/// Send through any frame sink, e.g. the write half of a split stream.
pub async fn send_to_sink<K, T>(sink: &mut K, msg: &T) -> anyhow::Result<()>
where
    K: Sink<Bytes, Error = std::io::Error> + Unpin,
    T: Serialize,
{
    let data = serde_json::to_vec(msg)?;
    sink.send(Bytes::from(data)).await?;
    Ok(())
}

/// Receive and deserialize a message.
pub async fn recv_message<S, T>(stream: &mut MessageStream<S>) -> anyhow::Result<T>
where
    S: AsyncRead + AsyncWrite + Unpin,
    T: DeserializeOwned,
{
    match stream.next().await {
        Some(Ok(bytes)) => Ok(serde_json::from_slice(&bytes)?),
        Some(Err(e)) => Err(e.into()),
        None => Err(anyhow::anyhow!("connection closed")),
    }
}
