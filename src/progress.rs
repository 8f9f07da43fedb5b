//! Counters, progress monitoring and console display
//!
//! The processing loop is the only writer of [`Counters`]. A
//! [`ProgressMonitor`] thread samples them on an interval and reports
//! throughput; it never writes to them and never blocks the loop.

use colored::*;
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Default sampling interval of the monitor
pub const DEFAULT_MONITOR_INTERVAL: Duration = Duration::from_millis(500);

/// Per-source line counters, shared read-only with the monitor
#[derive(Debug, Default)]
pub struct Counters {
    total_lines: AtomicU64,
    valid_lines: AtomicU64,
    regional_lines: AtomicU64,
    rejected_lines: AtomicU64,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_line(&self) {
        self.total_lines.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_valid(&self) {
        self.valid_lines.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_regional(&self) {
        self.regional_lines.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_rejected(&self) {
        self.rejected_lines.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy of the current values. Each field is read atomically.
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            total_lines: self.total_lines.load(Ordering::Relaxed),
            valid_lines: self.valid_lines.load(Ordering::Relaxed),
            regional_lines: self.regional_lines.load(Ordering::Relaxed),
            rejected_lines: self.rejected_lines.load(Ordering::Relaxed),
        }
    }
}

/// Plain counter values
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub total_lines: u64,
    pub valid_lines: u64,
    pub regional_lines: u64,
    /// Shown as "spam removed" in summaries
    pub rejected_lines: u64,
}

impl CounterSnapshot {
    /// Overwrite valid/regional with the lengths of the final sequences
    pub fn reconciled(mut self, valid: usize, regional: usize) -> Self {
        self.valid_lines = valid as u64;
        self.regional_lines = regional as u64;
        self
    }

    /// Field-wise sum
    pub fn add(&mut self, other: &CounterSnapshot) {
        self.total_lines += other.total_lines;
        self.valid_lines += other.valid_lines;
        self.regional_lines += other.regional_lines;
        self.rejected_lines += other.rejected_lines;
    }

    /// Valid lines as a percentage of all lines seen
    pub fn success_rate(&self) -> f64 {
        if self.total_lines == 0 {
            0.0
        } else {
            self.valid_lines as f64 * 100.0 / self.total_lines as f64
        }
    }
}

/// One observation taken by the monitor
#[derive(Debug, Clone, Copy)]
pub struct ProgressSample {
    pub snapshot: CounterSnapshot,
    pub elapsed: Duration,
}

impl ProgressSample {
    pub fn lines_per_second(&self) -> f64 {
        rate(self.snapshot.total_lines, self.elapsed)
    }
}

fn rate(count: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        count as f64 / secs
    } else {
        0.0
    }
}

/// Background observer of a [`Counters`] instance.
///
/// Stopping is cooperative: [`stop`](Self::stop) (or drop) closes the signal
/// channel and joins the thread, so a report in flight always completes
/// before the owner continues.
pub struct ProgressMonitor {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<u64>>,
}

impl ProgressMonitor {
    /// Start sampling `counters` every `interval`, handing each sample to `report`
    pub fn spawn<F>(counters: Arc<Counters>, interval: Duration, mut report: F) -> Self
    where
        F: FnMut(&ProgressSample) + Send + 'static,
    {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let started = Instant::now();

        let spawned = thread::Builder::new()
            .name("progress-monitor".to_string())
            .spawn(move || {
                let mut samples = 0u64;
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            let sample = ProgressSample {
                                snapshot: counters.snapshot(),
                                elapsed: started.elapsed(),
                            };
                            report(&sample);
                            samples += 1;
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                samples
            });

        let handle = match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                log::warn!("Progress monitor unavailable: {}", e);
                None
            }
        };

        Self {
            stop_tx: Some(stop_tx),
            handle,
        }
    }

    /// Signal the monitor and wait for it; returns how many samples it took
    pub fn stop(mut self) -> u64 {
        self.shutdown()
    }

    fn shutdown(&mut self) -> u64 {
        drop(self.stop_tx.take());
        match self.handle.take() {
            Some(handle) => handle.join().unwrap_or_else(|_| {
                log::warn!("Progress monitor panicked");
                0
            }),
            None => 0,
        }
    }
}

impl Drop for ProgressMonitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Reporter that renders samples on a spinner
pub fn spinner_reporter(pb: ProgressBar, name: String) -> impl FnMut(&ProgressSample) + Send + 'static {
    move |sample| {
        let s = &sample.snapshot;
        pb.set_message(format!(
            "{}: {} lines, {} valid, {} regional ({:.0} lines/s)",
            name,
            format_number(s.total_lines),
            format_number(s.valid_lines),
            format_number(s.regional_lines),
            sample.lines_per_second(),
        ));
    }
}

/// Progress of an output write, reported every few records
#[derive(Debug, Clone, Copy)]
pub struct WriteProgress {
    pub written: u64,
    pub total: u64,
    pub elapsed: Duration,
}

impl WriteProgress {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.written as f64 * 100.0 / self.total as f64
        }
    }

    pub fn records_per_second(&self) -> f64 {
        rate(self.written, self.elapsed)
    }

    /// One-line status: percent, rate and time left
    pub fn describe(&self) -> String {
        let eta = self
            .eta()
            .map(format_duration)
            .unwrap_or_else(|| "unknown".to_string());
        format!(
            "{}/{} written ({:.1}%), {:.0} records/s, eta {}",
            format_number(self.written),
            format_number(self.total),
            self.percent(),
            self.records_per_second(),
            eta
        )
    }

    /// Estimated time left at the current rate
    pub fn eta(&self) -> Option<Duration> {
        let per_sec = self.records_per_second();
        if per_sec <= 0.0 {
            return None;
        }
        let remaining = self.total.saturating_sub(self.written);
        Some(Duration::from_secs_f64(remaining as f64 / per_sec))
    }
}

/// Print a section header
pub fn print_header(text: &str) {
    println!("\n{} {}", "▶".green(), text.green().bold());
}

/// Print an info message
pub fn print_info(text: &str) {
    println!("  {} {}", "ℹ".cyan(), text);
}

/// Print a success message
pub fn print_success(text: &str) {
    println!("  {} {}", "✔".green(), text.green());
}

/// Print a warning message
pub fn print_warning(text: &str) {
    println!("  {} {}", "⚠".yellow(), text.yellow());
}

/// Print an error message
pub fn print_error(text: &str) {
    eprintln!("  {} {}", "✖".red(), text.red());
}

/// Print a bullet point
pub fn print_bullet(text: &str) {
    println!("  {} {}", "•".green(), text);
}

/// Create a styled progress bar for record writes
pub fn create_progress_bar(total: u64, msg: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);

    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.green/dim}] {pos}/{len} ({percent}%, eta {eta}) {msg}")
    {
        pb.set_style(style.progress_chars("█▓░"));
    }

    pb.set_message(msg.to_string());
    pb
}

/// Create a styled spinner for indeterminate progress
pub fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();

    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}") {
        pb.set_style(style.tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ "));
    }

    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));

    pb
}

/// Print a counters summary block
pub fn print_summary(title: &str, counters: &CounterSnapshot, elapsed: Duration) {
    println!();
    println!("{}", "═".repeat(60).green());
    println!("{}", format!("  {}", title).green().bold());
    println!("{}", "═".repeat(60).green());

    println!("  {} {}", "Total lines:    ".green(), format_number(counters.total_lines));
    println!("  {} {}", "Valid:          ".green(), format_number(counters.valid_lines));
    println!("  {} {}", "Regional:       ".green(), format_number(counters.regional_lines));
    println!("  {} {}", "Spam removed:   ".yellow(), format_number(counters.rejected_lines));
    println!("  {} {}", "Duration:       ".green(), format_duration(elapsed));
    println!(
        "  {} {:.2} lines/sec",
        "Throughput:     ".green(),
        rate(counters.total_lines, elapsed)
    );

    if counters.valid_lines > 0 {
        println!("  {} {:.1}%", "Success rate:   ".green(), counters.success_rate());
    }
    println!("{}", "═".repeat(60).green());
}

/// Format a number with thousand separators
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::new();
    let chars: Vec<char> = s.chars().collect();

    for (i, c) in chars.iter().enumerate() {
        if i > 0 && (chars.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }

    result
}

/// Format duration as human-readable string
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();

    if secs < 60 {
        format!("{:.1}s", duration.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(123), "123");
        assert_eq!(format_number(1234), "1,234");
        assert_eq!(format_number(1234567), "1,234,567");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(30)), "30.0s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
        assert_eq!(format_duration(Duration::from_secs(3661)), "1h 1m");
    }

    #[test]
    fn test_counters_snapshot() {
        let counters = Counters::new();
        for _ in 0..10 {
            counters.add_line();
        }
        counters.add_valid();
        counters.add_valid();
        counters.add_regional();
        counters.add_rejected();

        let snap = counters.snapshot();
        assert_eq!(snap.total_lines, 10);
        assert_eq!(snap.valid_lines, 2);
        assert_eq!(snap.regional_lines, 1);
        assert_eq!(snap.rejected_lines, 1);
        assert!((snap.success_rate() - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_snapshot_add_and_reconcile() {
        let mut a = CounterSnapshot {
            total_lines: 5,
            valid_lines: 3,
            regional_lines: 1,
            rejected_lines: 2,
        };
        let copy = a;
        a.add(&copy);
        assert_eq!(a.total_lines, 10);
        assert_eq!(a.rejected_lines, 4);

        let r = a.reconciled(4, 0);
        assert_eq!(r.valid_lines, 4);
        assert_eq!(r.regional_lines, 0);
        assert_eq!(r.total_lines, 10);
    }

    #[test]
    fn test_monitor_samples_without_writing() {
        let counters = Arc::new(Counters::new());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        let monitor = ProgressMonitor::spawn(
            Arc::clone(&counters),
            Duration::from_millis(5),
            move |sample| sink.lock().unwrap().push(sample.snapshot.total_lines),
        );

        for _ in 0..1000 {
            counters.add_line();
        }
        thread::sleep(Duration::from_millis(50));
        let samples = monitor.stop();

        let seen = seen.lock().unwrap();
        assert_eq!(samples as usize, seen.len());
        assert!(samples > 0);
        // Observed values never go backwards and never exceed what was written
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert!(seen.iter().all(|&v| v <= 1000));
        assert_eq!(counters.snapshot().total_lines, 1000);
    }

    #[test]
    fn test_monitor_stops_before_first_interval() {
        let counters = Arc::new(Counters::new());
        let monitor = ProgressMonitor::spawn(counters, Duration::from_secs(60), |_| {});

        let started = Instant::now();
        assert_eq!(monitor.stop(), 0);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_monitor_waits_for_report_in_flight() {
        let counters = Arc::new(Counters::new());
        let finished = Arc::new(AtomicU64::new(0));

        let flag = Arc::clone(&finished);
        let monitor = ProgressMonitor::spawn(counters, Duration::from_millis(1), move |_| {
            thread::sleep(Duration::from_millis(20));
            flag.fetch_add(1, Ordering::SeqCst);
        });

        thread::sleep(Duration::from_millis(5));
        let samples = monitor.stop();

        // Every report that started also finished before stop returned
        assert_eq!(finished.load(Ordering::SeqCst), samples);
    }

    #[test]
    fn test_write_progress_eta() {
        let progress = WriteProgress {
            written: 500,
            total: 1000,
            elapsed: Duration::from_secs(5),
        };
        assert!((progress.percent() - 50.0).abs() < f64::EPSILON);
        assert_eq!(progress.eta(), Some(Duration::from_secs(5)));

        assert_eq!(
            progress.describe(),
            "500/1,000 written (50.0%), 100 records/s, eta 5.0s"
        );

        let empty = WriteProgress {
            written: 0,
            total: 0,
            elapsed: Duration::ZERO,
        };
        assert_eq!(empty.percent(), 100.0);
        assert_eq!(empty.eta(), None);
        assert!(empty.describe().ends_with("eta unknown"));
    }
}
