//! Display formatting for table cells

use serde::{Deserialize, Serialize};

/// Human readable byte count
pub fn format_bytes(count: f64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = 1024.0 * 1024.0;

    if count == 0.0 {
        "(empty)".to_string()
    } else if count > MB {
        format!("{:.1}MB", count / MB)
    } else if count > KB {
        format!("{:.1}kB", count / KB)
    } else {
        format!("{}B", count)
    }
}

/// Duration in milliseconds, e.g. `12ms` or `3.5ms`
pub fn format_duration(millis: f64) -> String {
    format!("{}ms", millis)
}

/// Colour class of a response status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusClass {
    /// Below 400
    Success,
    /// 400 and above
    Danger,
}

impl StatusClass {
    /// Class of a status code; `None` when no status is known (0)
    pub fn of(status: u16) -> Option<Self> {
        match status {
            0 => None,
            s if s < 400 => Some(StatusClass::Success),
            _ => Some(StatusClass::Danger),
        }
    }
}
