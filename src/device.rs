//! The device handle and its session serializer.
//!
//! All connection traffic for one receiver flows through at most one
//! "session" at a time: a bounded burst of work draining a pending state
//! refresh and/or the command queue, item by item, on a spawned task. The
//! periodic tick and the fire-and-forget set methods never perform I/O
//! themselves; they only record pending work and, when no session is
//! running, start one.

use crate::error::DenonError;
use crate::link::Link;
use crate::poll::poll_pass;
use crate::protocol;
use crate::queue::{CommandQueue, PendingWork, WorkKind};
use crate::state::DeviceState;
use crate::types::{Capabilities, DeviceConfig, PowerState};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::time::timeout;

/// Handle to one Denon receiver.
///
/// Clones share the same underlying instance. Methods must be called from
/// within a tokio runtime; set methods and `tick` return immediately and
/// never block on device I/O.
///
/// # Example
///
/// ```no_run
/// use denon_telnet::{DenonDevice, DeviceConfig};
///
/// #[tokio::main]
/// async fn main() {
///     let device = DenonDevice::new(DeviceConfig::new("192.168.1.50"));
///     if device.probe().await {
///         device.select_source("TV");
///         device.set_volume_level(0.5);
///         // drive the device from a 1s periodic timer
///         let mut interval = tokio::time::interval(std::time::Duration::from_secs(1));
///         loop {
///             interval.tick().await;
///             device.request_refresh();
///             device.tick();
///         }
///     }
/// }
/// ```
#[derive(Clone)]
pub struct DenonDevice {
    inner: Arc<Inner>,
}

struct Inner {
    config: DeviceConfig,
    /// Session token: true while a session task is running
    session_active: AtomicBool,
    /// Pending-work flags, the command queue and the in-flight slot.
    /// Locked only for brief bookkeeping, never across I/O.
    work: Mutex<WorkState>,
    /// The connection, held across the I/O of one session item
    link: tokio::sync::Mutex<Link>,
    state: Mutex<DeviceState>,
}

#[derive(Default)]
struct WorkState {
    pending: PendingWork,
    queue: CommandQueue,
    /// The command currently executing; requeued at the head if the session
    /// dies before it succeeds
    in_flight: Option<String>,
}

/// Clears the session token on every exit path, including cancellation
struct SessionToken<'a>(&'a AtomicBool);

impl Drop for SessionToken<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl DenonDevice {
    /// Create a handle. No I/O happens until the first probe, tick or
    /// set method.
    pub fn new(config: DeviceConfig) -> Self {
        let state = DeviceState::new(config.name.clone());
        Self {
            inner: Arc::new(Inner {
                link: tokio::sync::Mutex::new(Link::new(config.clone())),
                config,
                session_active: AtomicBool::new(false),
                work: Mutex::new(WorkState::default()),
                state: Mutex::new(state),
            }),
        }
    }

    /// Run one state refresh inline and report whether the receiver
    /// answered.
    ///
    /// Intended for setup wiring to decide whether the device exists.
    /// Returns `false` without touching the device if a session is already
    /// running.
    pub async fn probe(&self) -> bool {
        if !self.inner.claim_session() {
            return false;
        }
        let _token = SessionToken(&self.inner.session_active);
        let mut link = self.inner.link.lock().await;
        poll_pass(&mut link, &self.inner.state).await
    }

    /// Periodic callback, expected at a fixed 1s cadence.
    ///
    /// Starts a session when work is pending and none is running; otherwise
    /// schedules the idle-close check.
    pub fn tick(&self) {
        if self.inner.session_active.load(Ordering::Acquire) {
            return;
        }
        let work_pending = !self.inner.work.lock().unwrap().pending.is_empty();
        if work_pending {
            self.inner.clone().start_session_if_idle();
        } else {
            let inner = self.inner.clone();
            tokio::spawn(async move {
                if inner.session_active.load(Ordering::Acquire) {
                    return;
                }
                inner.link.lock().await.close_if_idle(Instant::now());
            });
        }
    }

    /// Request a state refresh on the next session
    pub fn request_refresh(&self) {
        self.inner.work.lock().unwrap().pending.mark(WorkKind::Poll);
        self.inner.clone().start_session_if_idle();
    }

    // ========== Set operations (fire-and-forget) ==========
    //
    // Each enqueues one command line and starts a session if none runs.
    // Failures are retried on later ticks; nothing is surfaced here.

    /// Turn the receiver on
    pub fn turn_on(&self) {
        self.enqueue(protocol::cmd_power(true));
    }

    /// Put the receiver into standby
    pub fn turn_off(&self) {
        self.enqueue(protocol::cmd_power(false));
    }

    /// Step the volume up
    pub fn volume_up(&self) {
        self.enqueue(protocol::CMD_VOLUME_UP.to_string());
    }

    /// Step the volume down
    pub fn volume_down(&self) {
        self.enqueue(protocol::CMD_VOLUME_DOWN.to_string());
    }

    /// Set the volume as a fraction `0.0..=1.0` of the learned maximum
    pub fn set_volume_level(&self, level: f32) {
        let volume_max = self.inner.state.lock().unwrap().volume_max;
        self.enqueue(protocol::cmd_volume(level.clamp(0.0, 1.0), volume_max));
    }

    /// Mute or unmute
    pub fn mute_volume(&self, mute: bool) {
        self.enqueue(protocol::cmd_mute(mute));
    }

    /// Select an input source by display name.
    ///
    /// Names not in the source table are ignored with a warning.
    pub fn select_source(&self, display_name: &str) {
        let code = self
            .inner
            .state
            .lock()
            .unwrap()
            .code_for(display_name)
            .map(str::to_string);
        match code {
            Some(code) => self.enqueue(protocol::cmd_select_source(&code)),
            None => {
                tracing::warn!(source = %display_name, "unknown source, ignoring selection");
            }
        }
    }

    /// Start playback (media modes)
    pub fn media_play(&self) {
        self.enqueue(protocol::CMD_PLAY.to_string());
    }

    /// Pause playback (media modes)
    pub fn media_pause(&self) {
        self.enqueue(protocol::CMD_PAUSE.to_string());
    }

    /// Stop playback (media modes)
    pub fn media_stop(&self) {
        self.enqueue(protocol::CMD_STOP.to_string());
    }

    /// Skip to the next track (media modes)
    pub fn media_next_track(&self) {
        self.enqueue(protocol::CMD_NEXT_TRACK.to_string());
    }

    /// Skip to the previous track (media modes)
    pub fn media_previous_track(&self) {
        self.enqueue(protocol::CMD_PREVIOUS_TRACK.to_string());
    }

    // ========== Cached state accessors ==========

    /// Device display name
    pub fn name(&self) -> String {
        self.inner.state.lock().unwrap().name.clone()
    }

    /// Last polled power state
    pub fn power_state(&self) -> PowerState {
        self.inner.state.lock().unwrap().power
    }

    /// Volume as a fraction of the learned maximum, in `0.0..=1.0`
    pub fn volume_level(&self) -> f32 {
        self.inner.state.lock().unwrap().volume_fraction()
    }

    /// Whether the receiver reports muted
    pub fn is_volume_muted(&self) -> bool {
        self.inner.state.lock().unwrap().muted
    }

    /// Sorted display names of the available sources
    pub fn source_list(&self) -> Vec<String> {
        self.inner.state.lock().unwrap().source_names()
    }

    /// Display name of the active source, if recognized
    pub fn source(&self) -> Option<String> {
        self.inner
            .state
            .lock()
            .unwrap()
            .source_display_name()
            .map(str::to_string)
    }

    /// Now-playing text, or the active source's display name outside media
    /// modes
    pub fn media_title(&self) -> String {
        self.inner.state.lock().unwrap().now_playing.clone()
    }

    /// Operations supported given the active source
    pub fn capabilities(&self) -> Capabilities {
        self.inner.state.lock().unwrap().capabilities()
    }

    fn enqueue(&self, command: String) {
        {
            let mut work = self.inner.work.lock().unwrap();
            work.queue.push_back(command);
            work.pending.mark(WorkKind::Command);
        }
        self.inner.clone().start_session_if_idle();
    }

    #[cfg(test)]
    fn session_running(&self) -> bool {
        self.inner.session_active.load(Ordering::Acquire)
    }
}

impl Inner {
    /// Claim the session token. At most one claimant wins until it is
    /// released.
    fn claim_session(&self) -> bool {
        self.session_active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Spawn the session task if no session is running
    fn start_session_if_idle(self: Arc<Self>) {
        if !self.claim_session() {
            return;
        }
        tokio::spawn(async move {
            self.run_session().await;
        });
    }

    /// One bounded session: drain pending work item by item, strictly
    /// sequentially. The token is held for the whole session and released
    /// on every exit path.
    async fn run_session(&self) {
        let _token = SessionToken(&self.session_active);

        // A receiver that just rejected a connection gets a breather
        // instead of a hot reconnect loop
        if self
            .link
            .lock()
            .await
            .within_error_debounce(Instant::now())
        {
            tracing::debug!("recent connection fault, deferring session");
            return;
        }

        if timeout(self.config.session_timeout, self.session_loop())
            .await
            .is_err()
        {
            tracing::error!(error = %DenonError::Timeout, "session abandoned");
        }

        // An abandoned in-flight command retries before anything enqueued
        // after it
        let mut work = self.work.lock().unwrap();
        if let Some(command) = work.in_flight.take() {
            work.queue.requeue_front(command);
        }
    }

    async fn session_loop(&self) {
        loop {
            let poll_pending = self.work.lock().unwrap().pending.contains(WorkKind::Poll);
            if poll_pending {
                let ok = {
                    let mut link = self.link.lock().await;
                    poll_pass(&mut link, &self.state).await
                };
                if !ok {
                    return;
                }
                self.work.lock().unwrap().pending.clear(WorkKind::Poll);
            }

            let next_command = {
                let mut work = self.work.lock().unwrap();
                if work.pending.contains(WorkKind::Command) {
                    let command = work.queue.pop_front();
                    work.in_flight.clone_from(&command);
                    command
                } else {
                    None
                }
            };
            if let Some(command) = next_command {
                let ok = {
                    let mut link = self.link.lock().await;
                    link.fire_and_forget(&command).await
                };
                if !ok {
                    // run_session's cleanup requeues the in-flight entry
                    return;
                }
                self.work.lock().unwrap().in_flight = None;
            }

            let mut work = self.work.lock().unwrap();
            if work.pending.contains(WorkKind::Command) && work.queue.is_empty() {
                work.pending.clear(WorkKind::Command);
            }
            if work.pending.is_empty() {
                return;
            }
        }
    }
}
