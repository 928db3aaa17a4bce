//! Line-delimited adapter: one encoded message per line in, one per line out.
//!
//! Each input line is an [`Inbound`] (a connection id plus its action).
//! Every notification the engine produces is written back as a
//! [`Delivery`] addressed to one connection. A front-end that owns the
//! real sockets multiplexes its clients over this pair of streams.
//!
//! ```text
//! → {"connection":1,"action":{"type":"createRoom","roomId":"R1","userName":"Alice"}}
//! ← {"connection":1,"notification":{"event":"roomCreated","data":"R1"}}
//! ```
//!
//! ## Connections and forwarders
//!
//! The engine talks to players through [`PlayerSender`]s, which carry bare
//! notifications. The console gives every connection id it sees its own
//! sender, backed by a small forwarding task that tags each notification
//! with the connection and passes it to one shared writer task. Output for
//! one connection therefore stays in order, and a slow writer never blocks
//! a room actor.
//!
//! A connection's entry lives until it sends `disconnect`. When the input
//! ends every remaining connection is disconnected, and `run` returns once
//! all pending output has been flushed.

use std::collections::HashMap;
use std::sync::Arc;

use codeduel_protocol::{
    ClientAction, Codec, ConnectionId, Delivery, Inbound, JsonCodec, Notification,
};
use codeduel_room::PlayerSender;
use codeduel_tasks::Executor;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{CodeduelError, Dispatcher};

/// Drives a [`Dispatcher`] from a reader and writes deliveries to a writer.
pub struct Console<E: Executor, C: Codec = JsonCodec> {
    dispatcher: Dispatcher<E>,
    codec: Arc<C>,
}

impl<E: Executor> Console<E, JsonCodec> {
    /// Creates a console speaking JSON lines.
    pub fn new(dispatcher: Dispatcher<E>) -> Self {
        Self::with_codec(dispatcher, JsonCodec)
    }
}

impl<E: Executor, C: Codec> Console<E, C> {
    pub fn with_codec(dispatcher: Dispatcher<E>, codec: C) -> Self {
        Self {
            dispatcher,
            codec: Arc::new(codec),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher<E> {
        &self.dispatcher
    }

    /// Reads actions from `reader` until it ends.
    ///
    /// Lines that don't decode are logged and skipped. Action failures
    /// are reported to the acting connection and don't stop the loop.
    ///
    /// # Errors
    /// Returns `CodeduelError::Io` if reading input or writing output
    /// fails.
    pub async fn run<R, W>(&self, reader: R, writer: W) -> Result<(), CodeduelError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let writer_task = tokio::spawn(write_deliveries(
            writer,
            out_rx,
            Arc::clone(&self.codec),
        ));

        let mut connections: HashMap<ConnectionId, PlayerSender> = HashMap::new();
        let mut lines = reader.lines();

        let read_result = loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            };
            if line.trim().is_empty() {
                continue;
            }

            let inbound: Inbound = match self.codec.decode(line.as_bytes()) {
                Ok(inbound) => inbound,
                Err(e) => {
                    warn!(error = %e, "skipping undecodable line");
                    continue;
                }
            };

            let connection = inbound.connection;
            let disconnecting = matches!(inbound.action, ClientAction::Disconnect);
            let sender = connections
                .entry(connection)
                .or_insert_with(|| forwarder(connection, out_tx.clone()));

            // Failures were already reported to the connection.
            let _ = self
                .dispatcher
                .dispatch(connection, inbound.action, sender)
                .await;

            // Its room has dropped its clone by now, so the forwarder
            // drains what is queued and stops.
            if disconnecting {
                connections.remove(&connection);
            }
        };

        info!(connections = connections.len(), "input closed, disconnecting");
        for &connection in connections.keys() {
            self.dispatcher.engine().disconnect(connection).await;
        }
        drop(connections);
        drop(out_tx);

        writer_task.await.map_err(std::io::Error::other)??;
        read_result?;
        Ok(())
    }
}

/// Creates the outbound channel for one connection.
///
/// A forwarding task tags each notification with `connection` and hands
/// it to the shared writer. It ends when every clone of the returned
/// sender is gone.
fn forwarder(
    connection: ConnectionId,
    out: mpsc::UnboundedSender<Delivery>,
) -> PlayerSender {
    let (tx, mut rx) = mpsc::unbounded_channel::<Notification>();
    tokio::spawn(async move {
        while let Some(notification) = rx.recv().await {
            let delivery = Delivery {
                connection,
                notification,
            };
            if out.send(delivery).is_err() {
                break;
            }
        }
        debug!(%connection, "forwarder stopped");
    });
    tx
}

async fn write_deliveries<W, C>(
    mut writer: W,
    mut deliveries: mpsc::UnboundedReceiver<Delivery>,
    codec: Arc<C>,
) -> Result<(), std::io::Error>
where
    W: AsyncWrite + Unpin,
    C: Codec,
{
    while let Some(delivery) = deliveries.recv().await {
        let mut bytes = match codec.encode(&delivery) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(
                    connection = %delivery.connection,
                    error = %e,
                    "dropping unencodable delivery"
                );
                continue;
            }
        };
        bytes.push(b'\n');
        writer.write_all(&bytes).await?;
        writer.flush().await?;
    }
    writer.shutdown().await
}
