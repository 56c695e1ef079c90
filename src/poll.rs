//! The state refresh pass: one fixed-order traversal of the receiver's
//! query vocabulary, updating the cached [`DeviceState`] field by field.
//!
//! Each step tolerates a missing or malformed answer by leaving its field at
//! the previous value. A connection-level fault aborts the whole pass; the
//! pass is then retried on a later tick.

use crate::link::Link;
use crate::protocol::{self, VolumeLine};
use crate::state::DeviceState;
use std::sync::Mutex;

/// Run one full refresh pass.
///
/// Returns whether the connection could be opened at all; a fault partway
/// through clears the last-activity marker and fails the pass without
/// touching fields already refreshed.
pub(crate) async fn poll_pass(link: &mut Link, state: &Mutex<DeviceState>) -> bool {
    if !link.ensure_open().await {
        return false;
    }

    match run_steps(link, state).await {
        Ok(()) => {
            link.record_activity();
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "state refresh failed");
            link.clear_activity();
            false
        }
    }
}

async fn run_steps(link: &mut Link, state: &Mutex<DeviceState>) -> crate::error::Result<()> {
    let needs_sources = !state.lock().unwrap().sources_initialized;
    if needs_sources {
        setup_sources(link, state).await?;
        state.lock().unwrap().sources_initialized = true;
    }

    if let Some(line) = link.request_one(protocol::QUERY_POWER).await? {
        state.lock().unwrap().power = protocol::parse_power(&line);
    }

    let volume_lines = link.request(protocol::QUERY_VOLUME, true).await?;
    {
        let mut state = state.lock().unwrap();
        for line in &volume_lines {
            match protocol::parse_volume_line(line) {
                Some(VolumeLine::Max(max)) => state.volume_max = max,
                Some(VolumeLine::Level(level)) => state.volume = level,
                None => {}
            }
        }
    }

    if let Some(line) = link.request_one(protocol::QUERY_MUTE).await? {
        state.lock().unwrap().muted = protocol::parse_mute(&line);
    }

    if let Some(line) = link.request_one(protocol::QUERY_SOURCE).await? {
        if let Some(code) = protocol::parse_source(&line) {
            state.lock().unwrap().source_code = code.to_string();
        }
    }

    let is_media_mode = state.lock().unwrap().is_media_mode();
    if is_media_mode {
        let lines = link.request(protocol::QUERY_NOW_PLAYING, true).await?;
        state.lock().unwrap().now_playing = protocol::join_now_playing(&lines);
    } else {
        let mut state = state.lock().unwrap();
        let display = state
            .source_display_name()
            .unwrap_or(&state.source_code)
            .to_string();
        state.now_playing = display;
    }

    Ok(())
}

/// Read the receiver's own source table. Runs once per instance lifetime;
/// a fault leaves the initialized flag unset so the next pass retries.
async fn setup_sources(link: &mut Link, state: &Mutex<DeviceState>) -> crate::error::Result<()> {
    if let Some(line) = link.request_one(protocol::QUERY_NETWORK_NAME).await? {
        if let Some(name) = protocol::parse_network_name(&line) {
            state.lock().unwrap().name = name.to_string();
        }
    }

    let assignment_lines = link.request(protocol::QUERY_SOURCE_FUNCTIONS, true).await?;
    let assignments: Vec<(String, String)> = assignment_lines
        .iter()
        .filter_map(|line| protocol::parse_source_assignment(line))
        .collect();
    if !assignments.is_empty() {
        state.lock().unwrap().sources = assignments.into_iter().collect();
    }

    // Collect the deleted codes first, then remove them in one sweep
    let deletion_lines = link.request(protocol::QUERY_SOURCE_DELETIONS, true).await?;
    let deleted: Vec<&str> = deletion_lines
        .iter()
        .filter_map(|line| protocol::parse_source_deletion(line))
        .collect();
    if !deleted.is_empty() {
        let mut state = state.lock().unwrap();
        state.sources.retain(|_, code| !deleted.contains(&code.as_str()));
    }

    Ok(())
}
