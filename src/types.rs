use serde::Deserialize;
use std::ops::{BitOr, BitOrAssign};
use std::time::Duration;

/// Default telnet control port
pub const DEFAULT_PORT: u16 = 23;

/// Default device name, replaced by the configured network name once polled
pub const DEFAULT_NAME: &str = "Music station";

const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(200);
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(3);
const DEFAULT_ERROR_DEBOUNCE: Duration = Duration::from_secs(1);
const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for a single receiver instance
///
/// Only `host` is required. The timing knobs default to values that suit the
/// receiver's telnet interface and rarely need changing.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    /// Receiver hostname or IP address
    pub host: String,

    /// Telnet control port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Display name, replaced by the receiver's network name when available
    #[serde(default = "default_name")]
    pub name: String,

    /// Per-line read timeout; a quiet period of this length ends a response
    #[serde(default = "default_read_timeout")]
    pub read_timeout: Duration,

    /// Connection is closed after this long with no activity
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout: Duration,

    /// No reconnect attempt within this window after a connection fault
    #[serde(default = "default_error_debounce")]
    pub error_debounce: Duration,

    /// Overall bound on one session (poll pass + queued commands)
    #[serde(default = "default_session_timeout")]
    pub session_timeout: Duration,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_name() -> String {
    DEFAULT_NAME.to_string()
}

fn default_read_timeout() -> Duration {
    DEFAULT_READ_TIMEOUT
}

fn default_idle_timeout() -> Duration {
    DEFAULT_IDLE_TIMEOUT
}

fn default_error_debounce() -> Duration {
    DEFAULT_ERROR_DEBOUNCE
}

fn default_session_timeout() -> Duration {
    DEFAULT_SESSION_TIMEOUT
}

impl DeviceConfig {
    /// Create a configuration with default name, port and timings
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            name: DEFAULT_NAME.to_string(),
            read_timeout: DEFAULT_READ_TIMEOUT,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            error_debounce: DEFAULT_ERROR_DEBOUNCE,
            session_timeout: DEFAULT_SESSION_TIMEOUT,
        }
    }
}

/// Receiver power state as reported by `PW?`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    /// Powered on
    On,
    /// In standby
    Standby,
    /// Not yet polled, or the receiver answered something unexpected
    Unknown,
}

/// Bitmask of operations the receiver currently supports
///
/// The base flags are always present; the transport-control flags are added
/// only while the active source is a media mode (tuner, network player, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities(u32);

impl Capabilities {
    pub const VOLUME_SET: Capabilities = Capabilities(1 << 0);
    pub const VOLUME_MUTE: Capabilities = Capabilities(1 << 1);
    pub const TURN_ON: Capabilities = Capabilities(1 << 2);
    pub const TURN_OFF: Capabilities = Capabilities(1 << 3);
    pub const SELECT_SOURCE: Capabilities = Capabilities(1 << 4);
    pub const PLAY: Capabilities = Capabilities(1 << 5);
    pub const PAUSE: Capabilities = Capabilities(1 << 6);
    pub const STOP: Capabilities = Capabilities(1 << 7);
    pub const NEXT_TRACK: Capabilities = Capabilities(1 << 8);
    pub const PREVIOUS_TRACK: Capabilities = Capabilities(1 << 9);

    /// Flags supported regardless of the active source
    pub const BASE: Capabilities = Capabilities(
        Self::VOLUME_SET.0
            | Self::VOLUME_MUTE.0
            | Self::TURN_ON.0
            | Self::TURN_OFF.0
            | Self::SELECT_SOURCE.0,
    );

    /// Transport controls, available in media modes only
    pub const MEDIA: Capabilities = Capabilities(
        Self::PLAY.0 | Self::PAUSE.0 | Self::STOP.0 | Self::NEXT_TRACK.0 | Self::PREVIOUS_TRACK.0,
    );

    /// Whether all flags in `other` are set
    pub fn contains(self, other: Capabilities) -> bool {
        self.0 & other.0 == other.0
    }

    /// Raw bitmask value
    pub fn bits(self) -> u32 {
        self.0
    }
}

impl BitOr for Capabilities {
    type Output = Capabilities;

    fn bitor(self, rhs: Capabilities) -> Capabilities {
        Capabilities(self.0 | rhs.0)
    }
}

impl BitOrAssign for Capabilities {
    fn bitor_assign(&mut self, rhs: Capabilities) {
        self.0 |= rhs.0;
    }
}
