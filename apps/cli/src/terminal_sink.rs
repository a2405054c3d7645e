//! Progress rendering for the terminal.

use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};

use nasferry_protocol::JobId;
use nasferry_sessions::TransferEventSink;

/// Prints session events to stdout on a single updating line.
pub struct TerminalSink {
    label: String,
    /// Last reported throughput, stored as `f64` bits.
    rate: AtomicU64,
}

impl TerminalSink {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            rate: AtomicU64::new(0f64.to_bits()),
        }
    }

    fn rate(&self) -> f64 {
        f64::from_bits(self.rate.load(Ordering::Relaxed))
    }

    fn line(&self, text: &str) {
        let mut out = std::io::stdout().lock();
        let _ = write!(out, "\r\x1b[2K{text}");
        let _ = out.flush();
    }

    fn finish_line(&self, text: &str) {
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "\r\x1b[2K{text}");
    }
}

impl TransferEventSink for TerminalSink {
    fn on_progress(&self, percent: f64) {
        let rate = self.rate();
        let text = if rate > 0.0 {
            format!("{} {:5.1}%  {}", self.label, percent, format_rate(rate))
        } else {
            format!("{} {:5.1}%", self.label, percent)
        };
        self.line(&text);
    }

    fn on_transfer_rate(&self, bytes_per_second: f64) {
        self.rate.store(bytes_per_second.to_bits(), Ordering::Relaxed);
    }

    fn on_file_started(&self, name: &str) {
        self.line(&format!("{} {name}", self.label));
    }

    fn on_file_finished(&self, name: &str, completed: usize, total: usize) {
        self.finish_line(&format!("[{completed}/{total}] {name}"));
    }

    fn on_completed(&self) {
        self.finish_line(&format!("{} done", self.label));
    }

    fn on_failed(&self, message: &str) {
        self.finish_line(&format!("{} failed: {message}", self.label));
    }

    fn on_cancelled(&self) {
        self.finish_line(&format!("{} cancelled", self.label));
    }

    fn on_ready_for_download(&self, job_id: &JobId, url: &str) {
        self.finish_line(&format!("archive {job_id} ready: {url}"));
    }
}

/// Human-readable throughput, e.g. `1.5 MB/s`.
pub fn format_rate(bytes_per_second: f64) -> String {
    format!("{}/s", format_bytes(bytes_per_second))
}

/// Human-readable size using 1024-based units.
pub fn format_bytes(bytes: f64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes.max(0.0);
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{value:.0} {}", UNITS[unit])
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
