//! 📊 progress.rs: "Is it still forwarding?" asks the on-call engineer, every five minutes.
//!
//! Two things live here:
//! - [`SourceProgress`]: a per-source indicatif bar over *compressed* bytes read, with a
//!   comfy-table of rates underneath. Hidden unless `show_progress` is on, because a
//!   lambda's log stream is not a terminal and doesn't want ANSI confetti.
//! - [`render_summary`]: the end-of-run table the CLI prints.
//!
//! ⚠️ Watching the bar will not make it go faster. Science says no. 🦆

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::NOTHING};
use indicatif::{ProgressBar, ProgressStyle};

use crate::common::InvocationSummary;

// -- 📏 one mebibyte. not a megabyte. there's a difference and I will die on this hill.
const MIB: u64 = 1024 * 1024;

// -- ⏱️ rates are averaged over this much recent history so one slow chunk doesn't cause panic
const RATE_WINDOW: Duration = Duration::from_secs(5);

/// 📦 Bytes, scaled to something a human can read at a glance.
fn format_bytes(bytes: u64) -> String {
    if bytes >= MIB {
        format!("{:.2} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= 1024 {
        format!("{:.2} KiB", bytes as f64 / 1024.0)
    } else {
        format!("{bytes} bytes")
    }
}

/// 🔢 `1234567` → `1,234,567`. You're welcome, eyes.
fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let mut result = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

/// ⏱️ MM:SS, or HH:MM:SS if the object is truly enormous.
fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

/// 📊 Progress for one source object: compressed bytes against the object's size,
/// lines forwarded, and windowed rates for both.
pub(crate) struct SourceProgress {
    label: String,
    total_size: u64,
    bytes_read: u64,
    lines_read: u64,
    progress_bar: ProgressBar,
    // -- (when, bytes, lines) samples inside the rate window
    rate_samples: VecDeque<(Instant, u64, u64)>,
    start_time: Instant,
}

impl std::fmt::Debug for SourceProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // -- 🎭 ProgressBar is a diva with no Debug; leave it out
        f.debug_struct("SourceProgress")
            .field("label", &self.label)
            .field("total_size", &self.total_size)
            .field("bytes_read", &self.bytes_read)
            .field("lines_read", &self.lines_read)
            .finish()
    }
}

impl SourceProgress {
    /// 🚀 `total_size` of `None` means the store didn't say; the bar just won't know 100%.
    pub(crate) fn new(label: String, total_size: Option<u64>, visible: bool) -> Self {
        let total_size = total_size.unwrap_or(0);
        let progress_bar = if visible {
            ProgressBar::new(total_size)
        } else {
            ProgressBar::hidden()
        };
        // -- 🎨 template is a literal; if indicatif ever rejects it we keep the default style
        if let Ok(style) = ProgressStyle::default_bar().template("{msg}\n| [{bar:40.cyan/blue}]") {
            progress_bar.set_style(style.progress_chars("=>-"));
        }

        let start_time = Instant::now();
        let mut rate_samples = VecDeque::new();
        rate_samples.push_back((start_time, 0, 0));

        Self {
            label,
            total_size,
            bytes_read: 0,
            lines_read: 0,
            progress_bar,
            rate_samples,
            start_time,
        }
    }

    /// 🔄 Moves the bar to absolute totals (not deltas) and re-renders.
    pub(crate) fn update(&mut self, bytes_read: u64, lines_read: u64) {
        self.bytes_read = bytes_read;
        self.lines_read = lines_read;
        if self.progress_bar.is_hidden() {
            return;
        }
        let (lines_per_sec, mib_per_sec) = self.calculate_rates();
        self.render(lines_per_sec, mib_per_sec);
        self.progress_bar.set_position(self.bytes_read);
    }

    /// ✅ Source done. Ring the bell.
    pub(crate) fn finish(&self) {
        self.progress_bar.finish();
    }

    fn calculate_rates(&mut self) -> (f64, f64) {
        let now = Instant::now();
        while let Some(&(timestamp, _, _)) = self.rate_samples.front() {
            if now.duration_since(timestamp) > RATE_WINDOW {
                self.rate_samples.pop_front();
            } else {
                break;
            }
        }
        self.rate_samples
            .push_back((now, self.bytes_read, self.lines_read));

        if let Some(&(oldest_time, oldest_bytes, oldest_lines)) = self.rate_samples.front() {
            let elapsed = now.duration_since(oldest_time).as_secs_f64();
            if elapsed > 0.0 {
                let bytes_delta = self.bytes_read.saturating_sub(oldest_bytes);
                let lines_delta = self.lines_read.saturating_sub(oldest_lines);
                return (
                    lines_delta as f64 / elapsed,
                    (bytes_delta as f64 / elapsed) / MIB as f64,
                );
            }
        }
        // -- 💤 not enough history yet
        (0.0, 0.0)
    }

    fn render(&self, lines_per_sec: f64, mib_per_sec: f64) {
        let percent = if self.total_size > 0 {
            (self.bytes_read as f64 / self.total_size as f64) * 100.0
        } else {
            0.0
        };

        let elapsed = self.start_time.elapsed();
        let remaining = if percent > 0.0 {
            // 🔮 linear extrapolation; gzip ratios drift, so treat it as a vibe, not a promise
            let remaining_secs = elapsed.as_secs_f64() / (percent / 100.0) - elapsed.as_secs_f64();
            if remaining_secs > 0.0 {
                format_duration(Duration::from_secs_f64(remaining_secs))
            } else {
                "--:--".to_string()
            }
        } else {
            "--:--".to_string()
        };

        let mut table = Table::new();
        table.load_preset(NOTHING);
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.add_row(vec![
            Cell::new(format!("{} lines/s", format_number(lines_per_sec as u64)))
                .set_alignment(CellAlignment::Right),
            Cell::new(format!("{} lines", format_number(self.lines_read)))
                .set_alignment(CellAlignment::Right),
        ]);
        table.add_row(vec![
            Cell::new(format!("{mib_per_sec:.2} MiB/s")).set_alignment(CellAlignment::Right),
            Cell::new(format!(
                "{} / {}",
                format_bytes(self.bytes_read),
                format_bytes(self.total_size)
            ))
            .set_alignment(CellAlignment::Right),
        ]);
        table.add_row(vec![
            Cell::new(format!("{} elapsed", format_duration(elapsed)))
                .set_alignment(CellAlignment::Right),
            Cell::new(format!("{remaining} remaining")).set_alignment(CellAlignment::Right),
        ]);

        self.progress_bar
            .set_message(format!("source: {}\n{}", self.label, table));
    }
}

/// 🍽️ The end-of-run table: what got read, what got sent, how long it took.
pub fn render_summary(summary: &InvocationSummary, elapsed: Duration) -> String {
    let mut table = Table::new();
    table.load_preset(NOTHING);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    let rows = [
        ("sources", format_number(summary.sources_processed as u64)),
        ("lines forwarded", format_number(summary.lines_forwarded)),
        ("batches sent", format_number(summary.batches_sent)),
        ("compressed read", format_bytes(summary.compressed_bytes_read)),
        ("elapsed", format_duration(elapsed)),
    ];
    for (label, value) in rows {
        table.add_row(vec![
            Cell::new(label),
            Cell::new(value).set_alignment(CellAlignment::Right),
        ]);
    }
    table.to_string()
}
