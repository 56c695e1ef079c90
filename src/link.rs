//! Connection lifecycle and the request/response executor.
//!
//! The receiver allows very few concurrent control sessions, so the
//! connection is opened lazily, kept only while busy and closed after an
//! idle window. [`Link`] owns those open/close decisions together with the
//! last-activity and last-error bookkeeping the session guard relies on.

use crate::error::{DenonError, Result};
use crate::transport::Transport;
use crate::types::DeviceConfig;
use std::io::ErrorKind;
use std::time::Instant;

pub struct Link {
    config: DeviceConfig,
    transport: Option<Transport>,
    last_active: Option<Instant>,
    last_error: Option<Instant>,
}

impl Link {
    pub fn new(config: DeviceConfig) -> Self {
        Self {
            config,
            transport: None,
            last_active: None,
            last_error: None,
        }
    }

    #[cfg(test)]
    pub fn is_open(&self) -> bool {
        self.transport.is_some()
    }

    /// Open the connection if it is not already open.
    ///
    /// Records last-activity on success and last-error on failure, each
    /// clearing the other. Returns whether a connection is now open.
    pub async fn ensure_open(&mut self) -> bool {
        if self.transport.is_some() {
            return true;
        }
        match Transport::open(&self.config.host, self.config.port).await {
            Ok(transport) => {
                self.transport = Some(transport);
                self.record_activity();
                true
            }
            Err(e) => {
                tracing::error!(host = %self.config.host, error = %e, "connection failed");
                self.record_error();
                false
            }
        }
    }

    /// Close the connection if open
    pub fn close(&mut self) {
        if self.transport.take().is_some() {
            tracing::debug!(host = %self.config.host, "closing connection");
            self.last_active = None;
            self.last_error = Some(Instant::now());
        }
    }

    /// Close the connection once it has sat idle past the idle timeout.
    ///
    /// Called from the periodic tick, and only when no work is pending and
    /// no session is running.
    pub fn close_if_idle(&mut self, now: Instant) {
        if self.transport.is_none() {
            return;
        }
        let idle = match self.last_active {
            None => true,
            Some(at) => now.duration_since(at) >= self.config.idle_timeout,
        };
        if idle {
            self.close();
        }
    }

    /// Whether the most recent fault is still within the debounce window
    pub fn within_error_debounce(&self, now: Instant) -> bool {
        match self.last_error {
            Some(at) => now.duration_since(at) < self.config.error_debounce,
            None => false,
        }
    }

    #[cfg(test)]
    pub fn last_active(&self) -> Option<Instant> {
        self.last_active
    }

    pub fn record_activity(&mut self) {
        self.last_active = Some(Instant::now());
        self.last_error = None;
    }

    /// Clear the activity marker without recording a fault timestamp.
    ///
    /// Used when a refresh pass dies partway through: the next idle check
    /// then closes the connection, but reconnecting is not debounced.
    pub fn clear_activity(&mut self) {
        self.last_active = None;
    }

    pub fn record_error(&mut self) {
        self.last_active = None;
        self.last_error = Some(Instant::now());
    }

    /// Send `command` and collect its answer lines.
    ///
    /// A reset or broken pipe is logged and reported as an empty answer,
    /// never as an error; callers treat missing lines as "leave the field
    /// unchanged". Other I/O faults propagate so the poll pass can record
    /// them. Requires an open connection.
    pub async fn request(&mut self, command: &str, expect_multiple: bool) -> Result<Vec<String>> {
        let read_timeout = self.config.read_timeout;
        let transport = self.transport.as_mut().ok_or(DenonError::NotConnected)?;

        let result = async {
            transport.write_line(command).await?;
            transport.read_lines_until_quiet(read_timeout).await
        }
        .await;

        match result {
            Ok(mut lines) => {
                if !expect_multiple {
                    lines.truncate(1);
                }
                Ok(lines)
            }
            Err(DenonError::Connection(e))
                if matches!(
                    e.kind(),
                    ErrorKind::ConnectionReset | ErrorKind::BrokenPipe
                ) =>
            {
                tracing::error!(command = %command, error = %e, "connection dropped during request");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    /// Send `command` and return its first answer line, if any
    pub async fn request_one(&mut self, command: &str) -> Result<Option<String>> {
        Ok(self.request(command, false).await?.into_iter().next())
    }

    /// Open the connection if needed, send `command` and discard whatever
    /// the receiver answers.
    ///
    /// Returns whether the command was written. Faults are recorded and
    /// logged but never propagated.
    pub async fn fire_and_forget(&mut self, command: &str) -> bool {
        if !self.ensure_open().await {
            return false;
        }

        let result = async {
            let transport = self.transport.as_mut().ok_or(DenonError::NotConnected)?;
            transport.write_line(command).await?;
            transport.drain()
        }
        .await;

        match result {
            Ok(()) => {
                self.record_activity();
                true
            }
            Err(e) => {
                tracing::error!(command = %command, error = %e, "command failed");
                self.record_error();
                self.transport = None;
                false
            }
        }
    }
}
