//! Enumeration of candidate serial devices on the host.
//!
//! The builtin pattern table covers the platform's conventional device
//! names: USB serial adapters, modem-class ACM devices, legacy UARTs and
//! vendor `cu.*` nodes on Unix, numbered COM ports on Windows.
//! [`candidate_ports`] unions the matches for every builtin pattern while
//! keeping first-seen order; [`matching_ports`] is the primitive it is built
//! from and accepts any caller pattern.

use once_cell::sync::Lazy;
use regex::Regex;

#[cfg(unix)]
const BUILTIN_PATTERNS: &[&str] = &[
    r"^/dev/ttyUSB\d+$",
    r"^/dev/ttyACM\d+$",
    r"^/dev/ttyS\d+$",
    r"^/dev/cu\..+$",
];

#[cfg(windows)]
const BUILTIN_PATTERNS: &[&str] = &[r"^\\\\\.\\COM\d+$"];

static COMPILED_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    BUILTIN_PATTERNS
        .iter()
        .map(|pattern| Regex::new(pattern).expect("builtin pattern is valid"))
        .collect()
});

/// Device names matching `pattern`, deduplicated, in enumeration order.
pub fn matching_ports(pattern: &Regex) -> Vec<String> {
    let mut matches = Vec::new();
    for name in platform_port_names() {
        if pattern.is_match(&name) {
            push_unique(&mut matches, name);
        }
    }
    matches
}

/// Candidate device names for every builtin naming convention.
///
/// Duplicates between patterns are dropped, keeping the first occurrence,
/// so the result is ordered by pattern priority and then enumeration order.
pub fn candidate_ports() -> Vec<String> {
    let mut candidates = Vec::new();
    for pattern in COMPILED_PATTERNS.iter() {
        for name in matching_ports(pattern) {
            push_unique(&mut candidates, name);
        }
    }
    candidates
}

fn push_unique(list: &mut Vec<String>, name: String) {
    if !list.iter().any(|existing| *existing == name) {
        list.push(name);
    }
}

#[cfg(unix)]
fn platform_port_names() -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    if let Ok(entries) = std::fs::read_dir("/dev") {
        for entry in entries.flatten() {
            names.push(entry.path().to_string_lossy().into_owned());
        }
    }
    // Directory iteration order is arbitrary; sort so repeated calls agree.
    names.sort();
    // The OS enumerator can know devices a /dev scan misses.
    if let Ok(ports) = serialport::available_ports() {
        for port in ports {
            push_unique(&mut names, port.port_name);
        }
    }
    names
}

#[cfg(windows)]
fn platform_port_names() -> Vec<String> {
    let mut names = Vec::new();
    if let Ok(ports) = serialport::available_ports() {
        for port in ports {
            let name = if port.port_name.starts_with(r"\\.\") {
                port.port_name
            } else {
                format!(r"\\.\{}", port.port_name)
            };
            push_unique(&mut names, name);
        }
    }
    names
}
