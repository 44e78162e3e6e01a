use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic time source injected into the perimetry state machine.
pub trait Timer: Clone + Send + Sync {
    type Timestamp: Copy + Clone + Send + Sync;
    fn now(&self) -> Self::Timestamp;
    fn elapsed(&self, ts: Self::Timestamp) -> Duration;
    fn sleep(&self, d: Duration);
}

/// Seconds between two nanosecond timestamps; negative if `later` is earlier.
pub fn seconds_between(earlier: u64, later: u64) -> f64 {
    if later >= earlier {
        (later - earlier) as f64 / 1e9
    } else {
        -((earlier - later) as f64 / 1e9)
    }
}

/// Wall-clock timer with nanosecond timestamps since creation.
#[derive(Debug, Clone)]
pub struct HighPrecisionTimer {
    pub start: Instant,
}

impl Timer for HighPrecisionTimer {
    type Timestamp = u64;
    fn now(&self) -> u64 {
        self.start.elapsed().as_nanos() as u64
    }
    fn elapsed(&self, ts: u64) -> Duration {
        Duration::from_nanos(self.now().saturating_sub(ts))
    }
    fn sleep(&self, d: Duration) {
        self.high_precision_sleep(d)
    }
}

impl HighPrecisionTimer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn high_precision_sleep(&self, duration: Duration) {
        #[cfg(target_os = "linux")]
        self.linux_sleep(duration);
        #[cfg(not(target_os = "linux"))]
        std::thread::sleep(duration);
    }

    #[cfg(target_os = "linux")]
    fn linux_sleep(&self, duration: Duration) {
        use libc::{clock_nanosleep, timespec, CLOCK_MONOTONIC};

        let req = timespec {
            tv_sec: duration.as_secs() as libc::time_t,
            tv_nsec: duration.subsec_nanos() as libc::c_long,
        };

        let rc = unsafe { clock_nanosleep(CLOCK_MONOTONIC, 0, &req, std::ptr::null_mut()) };
        if rc != 0 {
            tracing::debug!(rc, "clock_nanosleep interrupted, falling back to thread::sleep");
            std::thread::sleep(duration);
        }
    }
}

impl Default for HighPrecisionTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// Manually driven clock. Clones share the same time, so a test or a
/// simulation can hold one handle and advance the clock seen by the other.
#[derive(Debug, Clone, Default)]
pub struct ManualTimer {
    now_ns: Arc<AtomicU64>,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(ns: u64) -> Self {
        Self {
            now_ns: Arc::new(AtomicU64::new(ns)),
        }
    }

    pub fn advance(&self, d: Duration) {
        self.now_ns
            .fetch_add(d.as_nanos() as u64, Ordering::SeqCst);
    }

    pub fn advance_secs(&self, secs: f64) {
        self.advance(Duration::from_secs_f64(secs));
    }

    pub fn set(&self, ns: u64) {
        self.now_ns.store(ns, Ordering::SeqCst);
    }
}

impl Timer for ManualTimer {
    type Timestamp = u64;
    fn now(&self) -> u64 {
        self.now_ns.load(Ordering::SeqCst)
    }
    fn elapsed(&self, ts: u64) -> Duration {
        Duration::from_nanos(self.now().saturating_sub(ts))
    }
    /// Sleeping a manual clock just moves it forward.
    fn sleep(&self, d: Duration) {
        self.advance(d);
    }
}

#[derive(Debug, Clone)]
pub struct FrameSummary {
    pub average_frame_time_ns: f64,
    pub jitter_ns: f64,
    pub min_frame_time_ns: f64,
    pub max_frame_time_ns: f64,
    pub effective_fps: f64,
}

/// Rolling window of frame durations.
#[derive(Debug, Clone)]
pub struct FrameStats {
    frame_times: VecDeque<Duration>,
    max_samples: usize,
}

impl FrameStats {
    pub fn new(max_samples: usize) -> Self {
        Self {
            frame_times: VecDeque::with_capacity(max_samples),
            max_samples: max_samples.max(1),
        }
    }

    pub fn record(&mut self, d: Duration) {
        if self.frame_times.len() >= self.max_samples {
            self.frame_times.pop_front();
        }
        self.frame_times.push_back(d);
    }

    pub fn frame_count(&self) -> usize {
        self.frame_times.len()
    }

    pub fn summary(&self) -> Option<FrameSummary> {
        if self.frame_times.is_empty() {
            return None;
        }
        let times: Vec<f64> = self
            .frame_times
            .iter()
            .map(|d| d.as_nanos() as f64)
            .collect();
        let avg = times.iter().sum::<f64>() / times.len() as f64;
        let var = times.iter().map(|x| (x - avg).powi(2)).sum::<f64>() / times.len() as f64;
        let min = times.iter().copied().fold(f64::INFINITY, f64::min);
        let max = times.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Some(FrameSummary {
            average_frame_time_ns: avg,
            jitter_ns: var.sqrt(),
            min_frame_time_ns: min,
            max_frame_time_ns: max,
            effective_fps: if avg > 0.0 { 1e9 / avg } else { 0.0 },
        })
    }
}

impl Default for FrameStats {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_timer_clones_share_time() {
        let timer = ManualTimer::new();
        let handle = timer.clone();
        let t0 = timer.now();
        handle.advance(Duration::from_millis(250));
        assert_eq!(timer.now() - t0, 250_000_000);
        assert_eq!(timer.elapsed(t0), Duration::from_millis(250));
    }

    #[test]
    fn test_manual_sleep_advances() {
        let timer = ManualTimer::starting_at(10);
        timer.sleep(Duration::from_nanos(5));
        assert_eq!(timer.now(), 15);
    }

    #[test]
    fn test_seconds_between_sign() {
        assert_eq!(seconds_between(0, 500_000_000), 0.5);
        assert_eq!(seconds_between(500_000_000, 0), -0.5);
    }

    #[test]
    fn test_high_precision_timer_is_monotonic() {
        let timer = HighPrecisionTimer::new();
        let a = timer.now();
        timer.sleep(Duration::from_micros(200));
        assert!(timer.now() >= a);
    }

    #[test]
    fn test_frame_stats_window() {
        let mut stats = FrameStats::new(2);
        assert!(stats.summary().is_none());
        stats.record(Duration::from_millis(100));
        stats.record(Duration::from_millis(10));
        stats.record(Duration::from_millis(20));
        assert_eq!(stats.frame_count(), 2);
        let summary = stats.summary().unwrap();
        assert_eq!(summary.min_frame_time_ns, 10e6);
        assert_eq!(summary.max_frame_time_ns, 20e6);
        assert!((summary.effective_fps - 1e9 / 15e6).abs() < 1e-9);
    }
}
