//! Line-oriented TCP transport to the receiver's telnet control port.
//!
//! The protocol is half-duplex request/response with CR-terminated lines and
//! no terminator for multi-line answers; end-of-response is detected by a
//! quiet read timeout.

use crate::error::{DenonError, Result};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// An open connection to the receiver
pub struct Transport {
    stream: TcpStream,
    /// Bytes read past the last line terminator, carried to the next read
    buf: Vec<u8>,
}

impl Transport {
    /// Open a TCP connection to the receiver
    pub async fn open(host: &str, port: u16) -> Result<Self> {
        let addr = format!("{host}:{port}");
        tracing::debug!(addr = %addr, "opening connection");
        let stream = TcpStream::connect(&addr).await?;
        Ok(Self {
            stream,
            buf: Vec::new(),
        })
    }

    /// Write a command line, appending the carriage-return terminator
    pub async fn write_line(&mut self, command: &str) -> Result<()> {
        tracing::debug!(command = %command, "sending");
        self.stream.write_all(command.as_bytes()).await?;
        self.stream.write_all(b"\r").await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Read one CR-terminated line, or `None` if nothing arrives within
    /// `per_read_timeout`.
    ///
    /// An EOF from the receiver is a connection fault, not a quiet timeout.
    pub async fn read_line(&mut self, per_read_timeout: Duration) -> Result<Option<String>> {
        loop {
            if let Some(pos) = self.buf.iter().position(|&b| b == b'\r') {
                let raw: Vec<u8> = self.buf.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&raw[..raw.len() - 1])
                    .trim_start_matches('\n')
                    .trim_end_matches('\r')
                    .to_string();
                tracing::debug!(line = %line, "received");
                return Ok(Some(line));
            }

            let mut chunk = [0u8; 256];
            match timeout(per_read_timeout, self.stream.read(&mut chunk)).await {
                Ok(Ok(0)) => return Err(DenonError::NotConnected),
                Ok(Ok(n)) => self.buf.extend_from_slice(&chunk[..n]),
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => return Ok(None),
            }
        }
    }

    /// Read lines until a read attempt stays quiet for `per_read_timeout`
    pub async fn read_lines_until_quiet(
        &mut self,
        per_read_timeout: Duration,
    ) -> Result<Vec<String>> {
        let mut lines = Vec::new();
        while let Some(line) = self.read_line(per_read_timeout).await? {
            lines.push(line);
        }
        Ok(lines)
    }

    /// Discard any buffered stray bytes without blocking
    pub fn drain(&mut self) -> Result<()> {
        self.buf.clear();
        let mut chunk = [0u8; 256];
        loop {
            match self.stream.try_read(&mut chunk) {
                Ok(0) => return Err(DenonError::NotConnected),
                Ok(_) => continue,
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) => return Err(e.into()),
            }
        }
    }
}
