//! Streaming transport - newline-delimited JSON over TCP.
//!
//! The session drives a `Connector` so the reconnect loop and the pipeline
//! can be exercised against in-memory fakes; the production implementation
//! dials the structure's sensor gateway. Connections split into reader and
//! writer halves so the session can wait on inbound lines while publishing
//! results.

pub mod reconnect;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use crate::error::{CoreError, CoreResult};

/// Inbound half of an established connection.
#[async_trait]
pub trait TransportReader: Send {
    /// Next inbound line; `None` on orderly close.
    async fn recv(&mut self) -> CoreResult<Option<String>>;
}

/// Outbound half of an established connection.
#[async_trait]
pub trait TransportWriter: Send {
    /// Write one outbound line.
    async fn send(&mut self, line: &str) -> CoreResult<()>;
}

pub type TransportPair = (Box<dyn TransportReader>, Box<dyn TransportWriter>);

/// Dials a fresh connection. Each call is one connection attempt.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> CoreResult<TransportPair>;
}

pub struct TcpConnector {
    addr: String,
}

impl TcpConnector {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self) -> CoreResult<TransportPair> {
        let stream = TcpStream::connect(&self.addr)
            .await
            .map_err(|e| CoreError::Transport(format!("connect {}: {}", self.addr, e)))?;
        let (read_half, write_half) = stream.into_split();
        Ok((
            Box::new(TcpReader {
                reader: BufReader::new(read_half),
            }),
            Box::new(TcpWriter { writer: write_half }),
        ))
    }
}

pub struct TcpReader {
    reader: BufReader<OwnedReadHalf>,
}

#[async_trait]
impl TransportReader for TcpReader {
    async fn recv(&mut self) -> CoreResult<Option<String>> {
        let mut line = String::new();
        let n = self.reader.read_line(&mut line).await?;
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }
}

pub struct TcpWriter {
    writer: OwnedWriteHalf,
}

#[async_trait]
impl TransportWriter for TcpWriter {
    async fn send(&mut self, line: &str) -> CoreResult<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }
}
