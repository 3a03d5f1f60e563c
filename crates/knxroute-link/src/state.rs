use core::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Stable identifier the router assigns to a link at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LinkId(u32);

impl LinkId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle state of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LinkState {
    #[default]
    Down,
    Starting,
    Up,
    Stopping,
    Failed,
}

impl LinkState {
    pub const fn is_up(self) -> bool {
        matches!(self, Self::Up)
    }

    /// `Down` and `Failed` both mean nothing is running.
    pub const fn is_down(self) -> bool {
        matches!(self, Self::Down | Self::Failed)
    }

    const fn to_u8(self) -> u8 {
        match self {
            Self::Down => 0,
            Self::Starting => 1,
            Self::Up => 2,
            Self::Stopping => 3,
            Self::Failed => 4,
        }
    }

    const fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Starting,
            2 => Self::Up,
            3 => Self::Stopping,
            4 => Self::Failed,
            _ => Self::Down,
        }
    }
}

/// A [`LinkState`] that link threads update and the reactor reads.
#[derive(Debug, Default)]
pub struct AtomicLinkState(AtomicU8);

impl AtomicLinkState {
    pub const fn new(state: LinkState) -> Self {
        Self(AtomicU8::new(state.to_u8()))
    }

    pub fn get(&self) -> LinkState {
        LinkState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Stores `state`, returning the previous one.
    pub fn set(&self, state: LinkState) -> LinkState {
        LinkState::from_u8(self.0.swap(state.to_u8(), Ordering::AcqRel))
    }
}

#[cfg(test)]
mod tests {
    use super::{AtomicLinkState, LinkId, LinkState};

    #[test]
    fn atomic_state_round_trips_every_variant() {
        let cell = AtomicLinkState::default();
        assert_eq!(cell.get(), LinkState::Down);
        for state in [
            LinkState::Starting,
            LinkState::Up,
            LinkState::Stopping,
            LinkState::Failed,
            LinkState::Down,
        ] {
            cell.set(state);
            assert_eq!(cell.get(), state);
        }
    }

    #[test]
    fn set_returns_previous() {
        let cell = AtomicLinkState::new(LinkState::Up);
        assert_eq!(cell.set(LinkState::Failed), LinkState::Up);
        assert!(cell.get().is_down());
    }

    #[test]
    fn link_id_display() {
        assert_eq!(LinkId::new(7).to_string(), "#7");
    }
}
