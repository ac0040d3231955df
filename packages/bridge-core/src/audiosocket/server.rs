//! AudioSocket TCP server (§4.1, §6): accepts one connection per call, reads
//! the IDENTIFY handshake, and exposes ingress/egress channels to the audio
//! pipeline.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use uuid::Uuid;

use super::codec::{AudioSocketFrame, FrameDecoder};
use super::{AudioSocketError, AudioSocketResult};
use crate::protocol_constants::{
    AUDIOSOCKET_IDENTIFY_PAYLOAD_LEN, AUDIOSOCKET_IDENTIFY_TIMEOUT_SECS, EGRESS_QUEUE_CAPACITY,
};

/// A single accepted AudioSocket connection, post-IDENTIFY.
pub struct AudioSocketConnection {
    /// The call UUID read from the IDENTIFY frame.
    pub call_id: Uuid,
    /// Decoded frames arriving from Asterisk, in order.
    pub ingress: mpsc::Receiver<AudioSocketFrame>,
    /// Frames to write back to Asterisk; bounded so a stalled socket
    /// backpressures the pipeline instead of growing memory (§5).
    pub egress: mpsc::Sender<AudioSocketFrame>,
}

/// Listens for inbound AudioSocket TCP connections from Asterisk's
/// externalMedia channel and performs the IDENTIFY handshake on each.
pub struct AudioSocketServer {
    listener: TcpListener,
}

impl AudioSocketServer {
    pub async fn bind(host: &str, port: u16) -> AudioSocketResult<Self> {
        let listener = TcpListener::bind((host, port)).await?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts the next connection and completes its IDENTIFY handshake.
    ///
    /// The caller is expected to already know which call this connection
    /// belongs to (the orchestrator correlates by the UUID Asterisk was
    /// told to send via `externalMedia`'s `data` field, §6); a mismatch is
    /// a contract violation, not a malformed frame.
    pub async fn accept(&self, expected_call_id: Option<Uuid>) -> AudioSocketResult<AudioSocketConnection> {
        let (socket, _addr) = self.listener.accept().await?;
        identify(socket, expected_call_id).await
    }
}

async fn identify(
    mut socket: TcpStream,
    expected_call_id: Option<Uuid>,
) -> AudioSocketResult<AudioSocketConnection> {
    let call_id = tokio::time::timeout(
        Duration::from_secs(AUDIOSOCKET_IDENTIFY_TIMEOUT_SECS),
        read_identify(&mut socket),
    )
    .await
    .map_err(|_| AudioSocketError::IdentifyTimeout)??;

    if let Some(expected) = expected_call_id {
        if expected != call_id {
            return Err(AudioSocketError::IdentifyMismatch);
        }
    }

    let (ingress_tx, ingress_rx) = mpsc::channel(EGRESS_QUEUE_CAPACITY);
    let (egress_tx, egress_rx) = mpsc::channel::<AudioSocketFrame>(EGRESS_QUEUE_CAPACITY);

    let (mut read_half, mut write_half) = socket.into_split();
    tokio::spawn(async move {
        let mut decoder = FrameDecoder::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = match read_half.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    log::warn!("[AudioSocket] read error: {e}");
                    break;
                }
            };
            decoder.push(&buf[..n]);
            loop {
                match decoder.next_frame() {
                    Ok(Some(frame)) => {
                        let is_terminate = matches!(frame, AudioSocketFrame::Terminate);
                        if ingress_tx.send(frame).await.is_err() {
                            return;
                        }
                        if is_terminate {
                            return;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        log::warn!("[AudioSocket] malformed frame: {e}");
                        return;
                    }
                }
            }
        }
    });

    let mut egress_rx = egress_rx;
    tokio::spawn(async move {
        while let Some(frame) = egress_rx.recv().await {
            let wire = match frame.encode() {
                Ok(w) => w,
                Err(e) => {
                    log::warn!("[AudioSocket] failed to encode outgoing frame: {e}");
                    continue;
                }
            };
            if let Err(e) = write_half.write_all(&wire).await {
                log::warn!("[AudioSocket] write error: {e}");
                break;
            }
        }
    });

    Ok(AudioSocketConnection {
        call_id,
        ingress: ingress_rx,
        egress: egress_tx,
    })
}

async fn read_identify(socket: &mut TcpStream) -> AudioSocketResult<Uuid> {
    let mut header = [0u8; 3];
    socket.read_exact(&mut header).await?;
    let length = u16::from_be_bytes([header[1], header[2]]) as usize;
    if length != AUDIOSOCKET_IDENTIFY_PAYLOAD_LEN {
        return Err(AudioSocketError::Malformed(format!(
            "IDENTIFY payload length {length}, expected {AUDIOSOCKET_IDENTIFY_PAYLOAD_LEN}"
        )));
    }
    let mut payload = [0u8; AUDIOSOCKET_IDENTIFY_PAYLOAD_LEN];
    socket.read_exact(&mut payload).await?;
    Ok(Uuid::from_bytes(payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt as _;
    use tokio::net::TcpStream as ClientStream;

    #[tokio::test]
    async fn accept_completes_identify_handshake_with_matching_uuid() {
        let server = AudioSocketServer::bind("127.0.0.1", 0).await.unwrap();
        let addr = server.local_addr().unwrap();
        let call_id = Uuid::new_v4();

        let client = tokio::spawn(async move {
            let mut stream = ClientStream::connect(addr).await.unwrap();
            let frame = AudioSocketFrame::Identify(call_id.into_bytes().to_vec());
            stream.write_all(&frame.encode().unwrap()).await.unwrap();
            stream
        });

        let connection = server.accept(Some(call_id)).await.unwrap();
        assert_eq!(connection.call_id, call_id);
        client.await.unwrap();
    }

    #[tokio::test]
    async fn accept_rejects_mismatched_identify_uuid() {
        let server = AudioSocketServer::bind("127.0.0.1", 0).await.unwrap();
        let addr = server.local_addr().unwrap();
        let sent_id = Uuid::new_v4();
        let expected_id = Uuid::new_v4();

        tokio::spawn(async move {
            let mut stream = ClientStream::connect(addr).await.unwrap();
            let frame = AudioSocketFrame::Identify(sent_id.into_bytes().to_vec());
            let _ = stream.write_all(&frame.encode().unwrap()).await;
        });

        let result = server.accept(Some(expected_id)).await;
        assert!(matches!(result, Err(AudioSocketError::IdentifyMismatch)));
    }
}
