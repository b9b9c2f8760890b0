use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Receives coarse status updates during a collection pass
pub trait ProgressReporter: Send + Sync {
    fn set_task(&self, message: &str);

    fn worked(&self, units: u64);

    /// Checked between enumeration entries and between report lines
    fn is_cancelled(&self) -> bool {
        false
    }
}

pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn set_task(&self, _message: &str) {}

    fn worked(&self, _units: u64) {}
}

/// Terminal spinner showing the current task and units of work done
pub struct ConsoleProgress {
    bar: ProgressBar,
    cancelled: Arc<AtomicBool>,
}

impl ConsoleProgress {
    pub fn new(message: &str) -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} [{pos}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ "),
        );
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));

        Self {
            bar,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that can be set from a signal handler to stop the pass
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn success(&self, message: &str) {
        self.bar.finish_with_message(format!("✓ {}", message));
    }

    pub fn error(&self, message: &str) {
        self.bar.abandon_with_message(format!("✗ {}", message));
    }
}

impl ProgressReporter for ConsoleProgress {
    fn set_task(&self, message: &str) {
        self.bar.set_message(message.to_string());
    }

    fn worked(&self, units: u64) {
        self.bar.inc(units);
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Keeps every message it receives; can cancel itself after some amount of work
#[derive(Default)]
pub struct RecordingProgress {
    tasks: Mutex<Vec<String>>,
    units: AtomicU64,
    cancelled: AtomicBool,
    cancel_after: Option<u64>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancelling_after(units: u64) -> Self {
        Self {
            cancel_after: Some(units),
            ..Self::default()
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn tasks(&self) -> Vec<String> {
        self.tasks
            .lock()
            .map(|tasks| tasks.clone())
            .unwrap_or_default()
    }

    pub fn units(&self) -> u64 {
        self.units.load(Ordering::SeqCst)
    }
}

impl ProgressReporter for RecordingProgress {
    fn set_task(&self, message: &str) {
        if let Ok(mut tasks) = self.tasks.lock() {
            tasks.push(message.to_string());
        }
    }

    fn worked(&self, units: u64) {
        let total = self.units.fetch_add(units, Ordering::SeqCst) + units;
        if self.cancel_after.is_some_and(|limit| total >= limit) {
            self.cancel();
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
