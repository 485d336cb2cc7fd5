//! Progress reporting for TTY and non-TTY environments.
//!
//! TTY mode: indicatif bars counting processed identifiers.
//! Non-TTY mode: hidden bars, the log records are the only progress signal.

use std::io::IsTerminal;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Counted bar: "authors  ━━━━━━━━━━  120/400  eta"
fn count_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{prefix:<12.dim} {bar:30.green/dim} {pos:>6}/{len:6} {eta:>4} {wide_msg:.dim}")
        .expect("invalid template")
        .progress_chars("--")
}

fn stage_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} {prefix:<10.cyan.bold} {wide_msg}")
        .expect("invalid template")
}

/// Central progress context owning the `MultiProgress`.
pub struct ProgressContext {
    multi: MultiProgress,
    is_tty: bool,
}

impl ProgressContext {
    /// Create new context, detecting TTY automatically.
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            is_tty: std::io::stderr().is_terminal(),
        }
    }

    /// Context that never draws anything (tests, library callers).
    pub fn hidden() -> Self {
        Self {
            multi: MultiProgress::new(),
            is_tty: false,
        }
    }

    /// Bar counting `total` units of work (identifiers queried, sources scanned).
    ///
    /// Non-TTY: hidden (no-op).
    pub fn task_bar(&self, name: &str, total: usize) -> ProgressBar {
        if !self.is_tty {
            return ProgressBar::hidden();
        }
        let pb = self.multi.add(ProgressBar::new(total as u64));
        pb.set_style(count_style());
        let display = if name.len() > 12 { &name[..12] } else { name };
        pb.set_prefix(display.to_string());
        pb
    }

    /// Spinner line for a pipeline stage. Call `pb.finish()` when done.
    pub fn stage_line(&self, name: &str) -> ProgressBar {
        if !self.is_tty {
            return ProgressBar::hidden();
        }
        let pb = self.multi.add(ProgressBar::new(0));
        pb.set_style(stage_style());
        pb.set_prefix(name.to_string());
        pb.enable_steady_tick(Duration::from_millis(80));
        pb
    }

    /// Print a line above managed progress bars.
    pub fn println(&self, msg: impl AsRef<str>) {
        if self.is_tty {
            let _ = self.multi.println(msg);
        } else {
            eprintln!("{}", msg.as_ref());
        }
    }

    pub fn is_tty(&self) -> bool {
        self.is_tty
    }

    /// `MultiProgress` for the log bridge.
    pub fn multi(&self) -> &MultiProgress {
        &self.multi
    }
}

impl Default for ProgressContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Format number with thousand separators.
pub fn fmt_num(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}
