//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Chat connection transport
//!
//! A TCP stream is split in two: the session task reads lines from the read
//! half, and a dedicated writer task owns the write half. Everything that
//! wants to talk to a session, including the session itself, goes through a
//! cloneable [`SessionWriter`] that feeds the writer task's bounded queue.

use crate::{ConnectionId, ControlMessage, DeliveryError, Result};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info, instrument, trace, warn};
use varidial_linecodec::{InputEvent, LineCodec, OutputFrame};

/// Items consumed by a writer task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Frames written back to back as one message
    Frames(Vec<OutputFrame>),
    /// Flush, shut down the write half, and stop
    Close,
}

/// Cloneable handle to a session's outbound queue
#[derive(Debug, Clone)]
pub struct SessionWriter {
    id: ConnectionId,
    tx: mpsc::Sender<Outbound>,
}

/// Create a writer handle and the queue it feeds
pub fn outbound_channel(
    id: ConnectionId,
    capacity: usize,
) -> (SessionWriter, mpsc::Receiver<Outbound>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (SessionWriter { id, tx }, rx)
}

impl SessionWriter {
    /// Connection this writer belongs to
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Check whether the writer task has gone away
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Queue frames, waiting as long as needed for space
    ///
    /// Used by a session for its own output, where waiting on its own
    /// client is the expected behavior.
    pub async fn send(&self, frames: Vec<OutputFrame>) -> std::result::Result<(), DeliveryError> {
        self.tx
            .send(Outbound::Frames(frames))
            .await
            .map_err(|_| DeliveryError::Closed)
    }

    /// Queue a single line
    pub async fn send_line(&self, text: impl Into<String>) -> std::result::Result<(), DeliveryError> {
        self.send(vec![OutputFrame::line(text)]).await
    }

    /// Queue frames on behalf of another session, giving up after `limit`
    pub async fn deliver(
        &self,
        frames: Vec<OutputFrame>,
        limit: Duration,
    ) -> std::result::Result<(), DeliveryError> {
        self.tx
            .send_timeout(Outbound::Frames(frames), limit)
            .await
            .map_err(|e| match e {
                mpsc::error::SendTimeoutError::Timeout(_) => DeliveryError::Timeout,
                mpsc::error::SendTimeoutError::Closed(_) => DeliveryError::Closed,
            })
    }

    /// Ask the writer task to flush and close the write half
    pub async fn close(&self) {
        let _ = self.tx.send(Outbound::Close).await;
    }
}

/// Drain a session's outbound queue onto the socket
///
/// Each write is bounded by `write_timeout`. A failed or stalled write ends
/// the task and asks the session to close.
pub async fn run_writer<W>(
    id: ConnectionId,
    mut sink: FramedWrite<W, LineCodec>,
    mut rx: mpsc::Receiver<Outbound>,
    write_timeout: Duration,
    control: mpsc::Sender<ControlMessage>,
) where
    W: tokio::io::AsyncWrite + Unpin,
{
    while let Some(item) = rx.recv().await {
        match item {
            Outbound::Frames(frames) => {
                let write = async {
                    for frame in frames {
                        sink.feed(frame).await?;
                    }
                    sink.flush().await
                };
                match timeout(write_timeout, write).await {
                    Ok(Ok(())) => trace!(connection_id = %id, "Frames written"),
                    Ok(Err(e)) => {
                        debug!(connection_id = %id, error = %e, "Write failed");
                        break;
                    }
                    Err(_) => {
                        warn!(connection_id = %id, "Write timed out, closing connection");
                        break;
                    }
                }
            }
            Outbound::Close => {
                let _ = timeout(write_timeout, sink.close()).await;
                return;
            }
        }
    }

    rx.close();
    let _ = control.try_send(ControlMessage::Close);
}

/// A connected chat client
///
/// Owns the read half and the writer task for one TCP connection.
pub struct ChatConnection {
    id: ConnectionId,
    peer_addr: SocketAddr,
    created_at: Instant,
    reader: FramedRead<OwnedReadHalf, LineCodec>,
    writer: SessionWriter,
    writer_task: Option<JoinHandle<()>>,
}

impl ChatConnection {
    /// Split a TCP stream and spawn its writer task
    #[instrument(skip(socket, control), fields(connection_id = %id))]
    pub fn wrap(
        socket: TcpStream,
        id: ConnectionId,
        outbound_buffer: usize,
        max_line_length: usize,
        write_timeout: Duration,
        control: mpsc::Sender<ControlMessage>,
    ) -> Result<Self> {
        let peer_addr = socket.peer_addr()?;
        let _ = socket.set_nodelay(true);
        info!(peer_addr = %peer_addr, "Creating new chat connection");

        let (read_half, write_half): (OwnedReadHalf, OwnedWriteHalf) = socket.into_split();
        let reader = FramedRead::new(read_half, LineCodec::with_max_line_length(max_line_length));
        let sink = FramedWrite::new(write_half, LineCodec::new());

        let (writer, rx) = outbound_channel(id, outbound_buffer);
        let writer_task = tokio::spawn(run_writer(id, sink, rx, write_timeout, control));

        Ok(Self {
            id,
            peer_addr,
            created_at: Instant::now(),
            reader,
            writer,
            writer_task: Some(writer_task),
        })
    }

    /// Get the connection ID
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Get the peer address
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Get when the connection was accepted
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Handle to this connection's outbound queue
    pub fn writer(&self) -> &SessionWriter {
        &self.writer
    }

    /// Receive the next inbound event
    ///
    /// Returns `Ok(None)` once the peer has closed its side.
    pub async fn next_event(&mut self) -> Result<Option<InputEvent>> {
        match self.reader.next().await {
            Some(Ok(event)) => Ok(Some(event)),
            Some(Err(e)) => Err(e.into()),
            None => {
                debug!(connection_id = %self.id, "Connection stream ended");
                Ok(None)
            }
        }
    }

    /// Close the write half and wait for the writer task to finish
    ///
    /// The writer task is aborted if it has not finished within `limit`.
    pub async fn shutdown(&mut self, limit: Duration) {
        let Some(mut task) = self.writer_task.take() else {
            return;
        };
        let writer = &self.writer;
        let finish = async {
            writer.close().await;
            let _ = (&mut task).await;
        };
        if timeout(limit, finish).await.is_err() {
            warn!(connection_id = %self.id, "Writer task did not stop in time, aborting");
            task.abort();
        }
    }
}

impl Drop for ChatConnection {
    fn drop(&mut self) {
        if let Some(task) = self.writer_task.take() {
            task.abort();
        }
    }
}

impl std::fmt::Debug for ChatConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatConnection")
            .field("id", &self.id)
            .field("peer_addr", &self.peer_addr)
            .field("created_at", &self.created_at)
            .finish()
    }
}
