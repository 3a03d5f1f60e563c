use std::collections::VecDeque;
use std::time::Duration;

use knxroute_core::LData;
use tokio::time::Instant;

/// How long a forwarded frame suppresses its own repetitions.
pub const DEFAULT_REPEAT_WINDOW: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone)]
struct IgnoreEntry {
    frame: LData,
    expires: Instant,
}

/// Remembers recently forwarded frames so that bus repetitions of them are
/// not forwarded a second time.
///
/// Entries expire lazily: they are pruned on the next check, never by a
/// timer. All entries share one window, so the queue stays ordered by
/// expiry.
#[derive(Debug, Clone)]
pub struct DedupFilter {
    window: Duration,
    entries: VecDeque<IgnoreEntry>,
}

impl Default for DedupFilter {
    fn default() -> Self {
        Self::new(DEFAULT_REPEAT_WINDOW)
    }
}

impl DedupFilter {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: VecDeque::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `frame` repeats one forwarded less than a window ago.
    ///
    /// Only frames carrying the repeat flag are ever suppressed.
    pub fn is_repeat(&mut self, frame: &LData, now: Instant) -> bool {
        self.prune(now);
        frame.repeated && self.entries.iter().any(|entry| entry.frame.same_content(frame))
    }

    /// Records `frame` as forwarded at `now`.
    pub fn record(&mut self, frame: &LData, now: Instant) {
        self.entries.push_back(IgnoreEntry {
            frame: frame.normalized(),
            expires: now + self.window,
        });
    }

    /// Checks `frame` and records it if it may pass. Returns `false` for a
    /// repeat that must be dropped.
    pub fn admit(&mut self, frame: &LData, now: Instant) -> bool {
        if self.is_repeat(frame, now) {
            return false;
        }
        self.record(frame, now);
        true
    }

    fn prune(&mut self, now: Instant) {
        while self.entries.front().is_some_and(|entry| entry.expires <= now) {
            self.entries.pop_front();
        }
    }
}
