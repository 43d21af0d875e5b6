//! Newline-delimited TCP adapter (tokio).
//!
//! One JSON document per line in both directions. A reader task splits the
//! socket on `\n` and feeds the registered handler; `send` appends `\n` and
//! enqueues the line on a writer task. Handler callbacks run on the reader
//! task, which is the channel's delivery thread.

use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use objlink_core::{ObjLinkError, Result};

use super::{MessageHandler, Transport};
use crate::lock_unpoisoned;

type SharedHandler = Arc<dyn Fn(&str) + Send + Sync>;

/// TCP transport carrying newline-framed JSON documents.
pub struct TcpLineTransport {
    outbound: mpsc::UnboundedSender<String>,
    handler: Arc<Mutex<Option<SharedHandler>>>,
}

impl TcpLineTransport {
    /// Connect to `addr` and spawn the reader/writer tasks on the current
    /// runtime.
    pub async fn connect(addr: &str) -> Result<Arc<Self>> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| ObjLinkError::Transport(format!("connect {addr}: {e}")))?;
        Ok(Self::from_stream(stream))
    }

    /// Adopt an already-connected stream.
    pub fn from_stream(stream: TcpStream) -> Arc<Self> {
        let (read_half, mut write_half) = stream.into_split();
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let handler: Arc<Mutex<Option<SharedHandler>>> = Arc::new(Mutex::new(None));

        tokio::spawn(async move {
            while let Some(line) = outbound_rx.recv().await {
                if let Err(e) = write_half.write_all(line.as_bytes()).await {
                    tracing::warn!(error = %e, "socket write failed");
                    break;
                }
            }
        });

        let reader_handler = handler.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(read_half).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if line.is_empty() {
                            continue;
                        }
                        let installed = lock_unpoisoned(&reader_handler).clone();
                        match installed {
                            Some(handler) => handler(&line),
                            None => {
                                tracing::warn!("inbound message before handler registration; dropped")
                            }
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!(error = %e, "socket read failed");
                        break;
                    }
                }
            }
            tracing::debug!("tcp reader finished");
        });

        Arc::new(Self { outbound, handler })
    }
}

impl Transport for TcpLineTransport {
    fn send(&self, text: &str) -> Result<()> {
        let mut line = String::with_capacity(text.len() + 1);
        line.push_str(text);
        line.push('\n');
        self.outbound
            .send(line)
            .map_err(|_| ObjLinkError::Transport("connection closed".into()))
    }

    fn register_message_handler(&self, handler: MessageHandler) {
        *lock_unpoisoned(&self.handler) = Some(Arc::from(handler));
    }
}
