//! Network timing insights
//!
//! Some network stacks attach per-request timing breakdowns. This module turns
//! them into the rows of an insights table, leaving out anything unreported
//! or zero.

use serde::{Deserialize, Serialize};

use crate::context::{format_bytes, KeyValueItem};

/// Retry summary for one request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryInsights {
    pub count: u32,
    pub limit: u32,
    pub time_spent: f64,
}

/// Timing breakdown of one request, all times in milliseconds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insights {
    pub dns_lookup_time: Option<f64>,
    pub connect_time: Option<f64>,
    pub ssl_handshake_time: Option<f64>,
    pub pre_transfer_time: Option<f64>,
    pub redirects_time: Option<f64>,
    pub time_to_first_byte: Option<f64>,
    pub transfer_time: Option<f64>,
    pub post_processing_time: Option<f64>,
    /// May differ from the payload size
    pub bytes_transfered: Option<f64>,
    /// Bytes per second
    pub transfer_speed: Option<f64>,
    pub retries: Option<RetryInsights>,
}

fn format_time(value: f64) -> String {
    format!("{} ms", value)
}

fn format_speed(value: f64) -> String {
    format!("{}/sec", format_bytes(value))
}

fn format_retries(retry: &RetryInsights) -> String {
    let times = if retry.limit == 1 { "time" } else { "times" };
    format!(
        "{} ({} {} out of {})",
        format_time(retry.time_spent),
        retry.count,
        times,
        retry.limit
    )
}

fn row(name: &str, value: Option<f64>, format: fn(f64) -> String) -> Option<KeyValueItem> {
    value
        .filter(|v| *v != 0.0)
        .map(|v| KeyValueItem::new(name, format(v)))
}

impl Insights {
    /// Table rows in display order
    pub fn rows(&self) -> Vec<KeyValueItem> {
        let retries = self
            .retries
            .as_ref()
            .map(|r| KeyValueItem::new("Retries", format_retries(r)));

        [
            retries,
            row("DNS lookup time", self.dns_lookup_time, format_time),
            row("Connect time", self.connect_time, format_time),
            row("SSL handshake time", self.ssl_handshake_time, format_time),
            row("Pretransfer time", self.pre_transfer_time, format_time),
            row("Redirect time", self.redirects_time, format_time),
            row("First byte wait time", self.time_to_first_byte, format_time),
            row("Data transfer time", self.transfer_time, format_time),
            row("Post processing time", self.post_processing_time, format_time),
            row("Bytes transfered", self.bytes_transfered, format_bytes),
            row("Transfer speed", self.transfer_speed, format_speed),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}
