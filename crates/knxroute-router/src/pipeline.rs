use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use knxroute_core::LData;
use knxroute_link::{Filter, LinkId};

/// Staged frames at which the router stops accepting more from links.
pub const DEFAULT_QUEUE_HIGH_WATER: usize = 256;

/// A frame received from a link, waiting for the reactor.
#[derive(Debug)]
pub(crate) struct Staged {
    pub(crate) frame: LData,
    pub(crate) origin: LinkId,
}

/// One step of the routing path.
///
/// The path is always `Low`, then the global filters, then `High`.
#[derive(Clone)]
pub(crate) enum Stage {
    /// Origin checks, loop and repeat suppression.
    Low,
    Global(Arc<dyn Filter>),
    /// Hop count policy and fan-out to the other links.
    High,
}

pub(crate) fn build_pipeline(globals: Vec<Arc<dyn Filter>>) -> Vec<Stage> {
    std::iter::once(Stage::Low)
        .chain(globals.into_iter().map(Stage::Global))
        .chain(std::iter::once(Stage::High))
        .collect()
}

/// Depth of the staging queue and the low-side `send_more` flag derived
/// from it. Shared between the reactor and every handle.
///
/// The gate closes at the high-water mark. Links that keep sending anyway
/// are cut off at twice the mark: further frames are refused and dropped
/// until the reactor catches up.
#[derive(Debug)]
pub(crate) struct FlowGate {
    depth: AtomicUsize,
    high_water: AtomicUsize,
    open: AtomicBool,
}

impl FlowGate {
    pub(crate) fn new(high_water: usize) -> Self {
        Self {
            depth: AtomicUsize::new(0),
            high_water: AtomicUsize::new(high_water.max(1)),
            open: AtomicBool::new(true),
        }
    }

    pub(crate) fn set_high_water(&self, high_water: usize) {
        self.high_water.store(high_water.max(1), Ordering::Release);
    }

    pub(crate) fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    pub(crate) fn depth(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }

    /// Reserves a slot for a frame about to be staged. Closes the gate at
    /// the high-water mark; returns `false` if the queue is full.
    pub(crate) fn enqueued(&self) -> bool {
        let high_water = self.high_water.load(Ordering::Acquire);
        let capacity = high_water.saturating_mul(2);
        let reserved = self
            .depth
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |depth| {
                (depth < capacity).then_some(depth + 1)
            });
        match reserved {
            Ok(previous) => {
                if previous + 1 >= high_water {
                    self.open.store(false, Ordering::Release);
                }
                true
            }
            Err(_) => {
                self.open.store(false, Ordering::Release);
                false
            }
        }
    }

    /// A frame left the staging queue. Returns `true` if this reopened the
    /// gate, i.e. the depth fell to half the high-water mark.
    pub(crate) fn dequeued(&self) -> bool {
        let depth = self
            .depth
            .fetch_sub(1, Ordering::AcqRel)
            .saturating_sub(1);
        if self.is_open() || depth > self.high_water.load(Ordering::Acquire) / 2 {
            return false;
        }
        !self.open.swap(true, Ordering::AcqRel)
    }
}

#[cfg(test)]
mod tests {
    use super::{build_pipeline, FlowGate, Stage};
    use knxroute_link::PassFilter;
    use std::sync::Arc;

    #[test]
    fn pipeline_brackets_globals() {
        let stages = build_pipeline(vec![Arc::new(PassFilter::new("g"))]);
        assert!(matches!(
            stages.as_slice(),
            [Stage::Low, Stage::Global(_), Stage::High]
        ));
        assert_eq!(build_pipeline(Vec::new()).len(), 2);
    }

    #[test]
    fn gate_closes_at_high_water_and_reopens_at_half() {
        let gate = FlowGate::new(4);
        for _ in 0..3 {
            gate.enqueued();
        }
        assert!(gate.is_open());
        gate.enqueued();
        assert!(!gate.is_open());

        assert!(!gate.dequeued());
        assert!(!gate.is_open());
        assert!(gate.dequeued());
        assert!(gate.is_open());
        assert!(!gate.dequeued());
        assert_eq!(gate.depth(), 1);
    }

    #[test]
    fn gate_refuses_frames_past_twice_high_water() {
        let gate = FlowGate::new(2);
        for _ in 0..4 {
            assert!(gate.enqueued());
        }
        assert!(!gate.enqueued());
        assert_eq!(gate.depth(), 4);

        gate.dequeued();
        assert!(gate.enqueued());
        assert_eq!(gate.depth(), 4);
    }
}
