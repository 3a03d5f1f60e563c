use crate::address::{Destination, GroupAddress, IndividualAddress};

/// Highest hop count. Under the force-broadcast policy a frame carrying it
/// is routed everywhere and never decremented.
pub const MAX_HOP_COUNT: u8 = 7;

/// Hop count stamped on frames originating at a router.
pub const DEFAULT_HOP_COUNT: u8 = 6;

/// Frame priority as carried in the control field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Priority {
    System,
    Normal,
    Urgent,
    #[default]
    Low,
}

/// An L_Data telegram.
///
/// Frames are immutable once handed to the router, which shares them behind
/// an `Arc` while fanning out. The router builds a fresh frame whenever it
/// rewrites routing metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LData {
    pub source: IndividualAddress,
    pub destination: Destination,
    pub priority: Priority,
    pub hop_count: u8,
    /// Set on retransmissions.
    pub repeated: bool,
    pub payload: Vec<u8>,
}

impl LData {
    pub fn new(
        source: IndividualAddress,
        destination: impl Into<Destination>,
        payload: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            source,
            destination: destination.into(),
            priority: Priority::default(),
            hop_count: DEFAULT_HOP_COUNT,
            repeated: false,
            payload: payload.into(),
        }
    }

    pub fn group(
        source: IndividualAddress,
        destination: GroupAddress,
        payload: impl Into<Vec<u8>>,
    ) -> Self {
        Self::new(source, destination, payload)
    }

    pub fn individual(
        source: IndividualAddress,
        destination: IndividualAddress,
        payload: impl Into<Vec<u8>>,
    ) -> Self {
        Self::new(source, destination, payload)
    }

    pub fn with_hop_count(mut self, hop_count: u8) -> Self {
        self.hop_count = hop_count.min(MAX_HOP_COUNT);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_repeated(mut self, repeated: bool) -> Self {
        self.repeated = repeated;
        self
    }

    /// Copy of the frame with the repeat flag cleared, i.e. its identity for
    /// duplicate detection.
    pub fn normalized(&self) -> Self {
        self.clone().with_repeated(false)
    }

    /// Compares everything except the repeat flag.
    pub fn same_content(&self, other: &Self) -> bool {
        self.source == other.source
            && self.destination == other.destination
            && self.priority == other.priority
            && self.hop_count == other.hop_count
            && self.payload == other.payload
    }
}
