//! Wire grammar of the Denon telnet control protocol.
//!
//! Every payload is a short ASCII line terminated by a single carriage
//! return. Queries end in `?`; multi-line answers share a prefix per logical
//! query and have no explicit terminator (end-of-response is detected by a
//! quiet read timeout at the transport layer). This module is pure parsing
//! and formatting; no I/O.

use crate::types::PowerState;
use std::collections::BTreeMap;

/// Factory-named inputs, used until the receiver's own source table is read
pub const NORMAL_INPUTS: &[(&str, &str)] = &[
    ("Cd", "CD"),
    ("Dvd", "DVD"),
    ("Blue ray", "BD"),
    ("TV", "TV"),
    ("Satellite / Cable", "SAT/CBL"),
    ("Game", "GAME"),
    ("Game2", "GAME2"),
    ("Video Aux", "V.AUX"),
    ("Dock", "DOCK"),
];

/// Sources that carry now-playing metadata and accept transport controls
pub const MEDIA_MODES: &[(&str, &str)] = &[
    ("Tuner", "TUNER"),
    ("Media server", "SERVER"),
    ("Ipod dock", "IPOD"),
    ("Net/USB", "NET/USB"),
    ("Rapsody", "RHAPSODY"),
    ("Napster", "NAPSTER"),
    ("Pandora", "PANDORA"),
    ("LastFM", "LASTFM"),
    ("Flickr", "FLICKR"),
    ("Favorites", "FAVORITES"),
    ("Internet Radio", "IRADIO"),
    ("USB/IPOD", "USB/IPOD"),
];

/// Answer-code prefixes of the `NSE` now-playing query, in protocol order.
/// The receiver sends one line per code; lines are consumed positionally.
pub const NSE_ANSWER_CODES: &[&str] = &[
    "NSE0", "NSE1X", "NSE2X", "NSE3X", "NSE4", "NSE5", "NSE6", "NSE7", "NSE8",
];

pub const QUERY_POWER: &str = "PW?";
pub const QUERY_VOLUME: &str = "MV?";
pub const QUERY_MUTE: &str = "MU?";
pub const QUERY_SOURCE: &str = "SI?";
pub const QUERY_NETWORK_NAME: &str = "NSFRN ?";
pub const QUERY_SOURCE_FUNCTIONS: &str = "SSFUN ?";
pub const QUERY_SOURCE_DELETIONS: &str = "SSSOD ?";
pub const QUERY_NOW_PLAYING: &str = "NSE";

pub const CMD_VOLUME_UP: &str = "MVUP";
pub const CMD_VOLUME_DOWN: &str = "MVDOWN";
pub const CMD_PLAY: &str = "NS9A";
pub const CMD_PAUSE: &str = "NS9B";
pub const CMD_STOP: &str = "NS9C";
pub const CMD_NEXT_TRACK: &str = "NS9D";
pub const CMD_PREVIOUS_TRACK: &str = "NS9E";

const MUTE_ON: &str = "MUON";

/// Build the initial display-name -> device-code source table
pub fn default_sources() -> BTreeMap<String, String> {
    NORMAL_INPUTS
        .iter()
        .chain(MEDIA_MODES.iter())
        .map(|(name, code)| (name.to_string(), code.to_string()))
        .collect()
}

/// Whether a device source code is one of the media modes
pub fn is_media_mode(code: &str) -> bool {
    MEDIA_MODES.iter().any(|(_, c)| *c == code)
}

/// Map a `PW?` answer line to a power state
pub fn parse_power(line: &str) -> PowerState {
    match line {
        "PWON" => PowerState::On,
        "PWSTANDBY" => PowerState::Standby,
        _ => PowerState::Unknown,
    }
}

/// One line of a `MV?` answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeLine {
    /// `MVMAX nn...` -- the receiver's maximum volume
    Max(u32),
    /// `MVnn...` -- the current volume
    Level(u32),
}

/// Parse one line of a `MV?` answer.
///
/// Both fields are fixed-width two-digit values; any finer resolution digit
/// after them (e.g. `MVMAX 80X`, `MV455` for 45.5) is ignored. Lines that
/// carry neither prefix, or no parsable digits, yield `None`.
pub fn parse_volume_line(line: &str) -> Option<VolumeLine> {
    if let Some(rest) = line.strip_prefix("MVMAX ") {
        return two_digit_field(rest).map(VolumeLine::Max);
    }
    if let Some(rest) = line.strip_prefix("MV") {
        return two_digit_field(rest).map(VolumeLine::Level);
    }
    None
}

fn two_digit_field(s: &str) -> Option<u32> {
    let digits: String = s.chars().take(2).take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// Whether a `MU?` answer line reports muted
pub fn parse_mute(line: &str) -> bool {
    line == MUTE_ON
}

/// Extract the source code from a `SI?` answer line
pub fn parse_source(line: &str) -> Option<&str> {
    line.strip_prefix("SI")
}

/// Extract the configured network name from a `NSFRN ?` answer line
pub fn parse_network_name(line: &str) -> Option<&str> {
    match line.strip_prefix("NSFRN ") {
        Some(name) if !name.is_empty() => Some(name),
        _ => None,
    }
}

/// Parse one `SSFUN` line into `(display_name, source_code)`.
///
/// A source with no configured name reuses its code as the display name.
pub fn parse_source_assignment(line: &str) -> Option<(String, String)> {
    let rest = line.strip_prefix("SSFUN")?;
    if rest.is_empty() || rest == " " {
        return None;
    }
    match rest.split_once(' ') {
        Some((code, name)) if !name.is_empty() => Some((name.to_string(), code.to_string())),
        Some((code, _)) => Some((code.to_string(), code.to_string())),
        None => Some((rest.to_string(), rest.to_string())),
    }
}

/// Parse one `SSSOD` line, returning the source code if it is marked deleted
pub fn parse_source_deletion(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("SSSOD")?;
    let (code, status) = rest.split_once(' ')?;
    if status == "DEL" {
        Some(code)
    } else {
        None
    }
}

/// Join `NSE` answer lines into the now-playing text.
///
/// Answer codes are consumed in their declared order, one per received line,
/// whatever the receiver actually sent first; each line contributes its text
/// after the code prefix plus a newline. Lines beyond the code list are
/// dropped.
pub fn join_now_playing(lines: &[String]) -> String {
    let mut text = String::new();
    for (line, code) in lines.iter().zip(NSE_ANSWER_CODES) {
        let value = line.get(code.len()..).unwrap_or("");
        text.push_str(value);
        text.push('\n');
    }
    text
}

/// Format the power command
pub fn cmd_power(on: bool) -> String {
    if on { "PWON" } else { "PWSTANDBY" }.to_string()
}

/// Format the mute command; on and off share one template
pub fn cmd_mute(mute: bool) -> String {
    format!("MU{}", if mute { "ON" } else { "OFF" })
}

/// Format an absolute volume command from a 0..=1 level and the learned max
pub fn cmd_volume(level: f32, volume_max: u32) -> String {
    format!("MV{:02}", (level * volume_max as f32).round() as u32)
}

/// Format a source-select command from a device source code
pub fn cmd_select_source(code: &str) -> String {
    format!("SI{code}")
}
