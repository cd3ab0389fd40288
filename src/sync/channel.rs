//! Persistent duplex connection to the backend's live event stream.

use std::time::Duration;

use futures::StreamExt as _;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::event::{ClientIntent, SyncEvent};
use crate::protocol;

pub const RECONNECT_DELAY: Duration = Duration::from_millis(2000);

/// What the channel task reports to the dashboard loop.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Connected,
    Event(SyncEvent),
    Disconnected(String),
}

/// Handle for sending intents to the backend.
#[derive(Debug, Clone)]
pub struct ChannelHandle {
    intents: mpsc::Sender<ClientIntent>,
}

impl ChannelHandle {
    /// Queue an intent; false if the channel task has stopped.
    pub async fn send(&self, intent: ClientIntent) -> bool {
        self.intents.send(intent).await.is_ok()
    }
}

/// Start the connect/reconnect task.
pub fn spawn(
    addr: String,
    reconnect_delay: Duration,
    events: mpsc::Sender<ChannelEvent>,
) -> (ChannelHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(16);
    let task = tokio::spawn(run(addr, reconnect_delay, events, rx));
    (ChannelHandle { intents: tx }, task)
}

async fn run(
    addr: String,
    reconnect_delay: Duration,
    events: mpsc::Sender<ChannelEvent>,
    mut intents: mpsc::Receiver<ClientIntent>,
) {
    loop {
        match TcpStream::connect(&addr).await {
            Ok(stream) => {
                info!("sync channel connected to {}", addr);
                // Intents issued while offline are not replayed
                while let Ok(stale) = intents.try_recv() {
                    warn!("dropping {:?} queued while disconnected", stale);
                }
                if events.send(ChannelEvent::Connected).await.is_err() {
                    return;
                }
                let reason = match run_session(stream, &events, &mut intents).await {
                    Ok(()) => return,
                    Err(e) => e.to_string(),
                };
                warn!("sync channel lost: {}", reason);
                if events.send(ChannelEvent::Disconnected(reason)).await.is_err() {
                    return;
                }
            }
            Err(e) => debug!("connect to {} failed: {}", addr, e),
        }
        tokio::time::sleep(reconnect_delay).await;
    }
}

/// Pump one connection until it fails. `Ok` means the dashboard side
/// has gone away and the task should stop.
pub async fn run_session<S>(
    stream: S,
    events: &mpsc::Sender<ChannelEvent>,
    intents: &mut mpsc::Receiver<ClientIntent>,
) -> anyhow::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let framed = protocol::message_stream(stream);
    let (mut sink, mut reader) = framed.split();

    loop {
        tokio::select! {
            result = reader.next() => {
                let bytes = match result {
                    Some(Ok(b)) => b,
                    Some(Err(e)) => return Err(e.into()),
                    None => return Err(anyhow::anyhow!("connection closed")),
                };
                let event: SyncEvent = match serde_json::from_slice(&bytes) {
                    Ok(event) => event,
                    Err(e) => {
                        warn!("ignoring undecodable event ({} bytes): {}", bytes.len(), e);
                        continue;
                    }
                };
                if events.send(ChannelEvent::Event(event)).await.is_err() {
                    return Ok(());
                }
            }
            intent = intents.recv() => {
                match intent {
                    Some(intent) => protocol::send_to_sink(&mut sink, &intent).await?,
                    None => return Ok(()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::event::Notice;
    use bytes::Bytes;
    use futures::SinkExt as _;

    #[tokio::test]
    async fn test_session_forwards_events_and_skips_garbage() {
        let (client, server) = tokio::io::duplex(4096);
        let (event_tx, mut event_rx) = mpsc::channel(8);
        let (_intent_tx, mut intent_rx) = mpsc::channel(8);
        let session = tokio::spawn(async move { run_session(client, &event_tx, &mut intent_rx).await });

        let mut backend = protocol::message_stream(server);
        backend
            .send(Bytes::from_static(br#"{"event": "telemetry", "data": {}}"#))
            .await
            .unwrap();
        backend.send(Bytes::from_static(b"not json")).await.unwrap();
        let status = SyncEvent::Status(Notice { message: "camera started".into() });
        protocol::send_message(&mut backend, &status).await.unwrap();

        assert_eq!(event_rx.recv().await, Some(ChannelEvent::Event(status)));

        drop(backend);
        let result = session.await.unwrap();
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnects_and_drops_offline_intents() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let (event_tx, mut event_rx) = mpsc::channel(8);
        let (handle, task) = spawn(addr, RECONNECT_DELAY, event_tx);

        let (first, _) = listener.accept().await.unwrap();
        assert_eq!(event_rx.recv().await, Some(ChannelEvent::Connected));

        drop(first);
        assert!(matches!(event_rx.recv().await, Some(ChannelEvent::Disconnected(_))));

        // queued while offline
        assert!(handle.send(ClientIntent::StartCamera).await);

        let (second, _) = listener.accept().await.unwrap();
        assert_eq!(event_rx.recv().await, Some(ChannelEvent::Connected));

        let mut backend = protocol::message_stream(second);
        assert!(handle.send(ClientIntent::StopCamera).await);
        let received: ClientIntent = protocol::recv_message(&mut backend).await.unwrap();
        assert_eq!(received, ClientIntent::StopCamera);

        task.abort();
    }

    #[tokio::test]
    async fn test_session_sends_intents() {
        let (client, server) = tokio::io::duplex(4096);
        let (event_tx, _event_rx) = mpsc::channel(8);
        let (intent_tx, mut intent_rx) = mpsc::channel(8);
        let session = tokio::spawn(async move { run_session(client, &event_tx, &mut intent_rx).await });

        let mut backend = protocol::message_stream(server);
        intent_tx.send(ClientIntent::StartCamera).await.unwrap();
        let received: ClientIntent = protocol::recv_message(&mut backend).await.unwrap();
        assert_eq!(received, ClientIntent::StartCamera);

        drop(intent_tx);
        assert!(session.await.unwrap().is_ok());
    }
}
