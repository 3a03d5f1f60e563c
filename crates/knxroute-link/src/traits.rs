use std::sync::Arc;

use knxroute_core::{GroupAddress, IndividualAddress, LBusmonitor, LData};
use thiserror::Error;

use crate::{LinkContext, LinkId, LinkState};

/// Errors reported by links and filters while being built or started.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid configuration for {link}: {reason}")]
    InvalidConfig { link: String, reason: String },
    #[error("link {0} failed to start")]
    StartFailed(String),
}

impl LinkError {
    pub fn invalid_config(link: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            link: link.into(),
            reason: reason.into(),
        }
    }
}

/// A bus endpoint registered with the router: a driver, a server, or a
/// client connection accepted by a server.
///
/// Links run on their own threads or tasks. The router calls into them from
/// its reactor; links call back only through the [`LinkContext`] they
/// receive in [`start`](Link::start), whose operations never block.
pub trait Link: Send + Sync {
    fn name(&self) -> &str;

    /// Current lifecycle state, re-read by the router after every
    /// [`LinkContext::state_changed`] notification.
    fn state(&self) -> LinkState;

    /// Begins bringing the link up. The link reports `Up` (or `Failed`)
    /// later through `ctx`. An `Err` here means it could not even try.
    fn start(&self, ctx: &LinkContext) -> Result<(), LinkError>;

    /// Begins taking the link down; completion is reported through `ctx`.
    fn stop(&self, ctx: &LinkContext);

    /// Delivers a frame towards the medium or client.
    fn send_l_data(&self, frame: Arc<LData>);

    /// Whether the link can accept another frame right now.
    fn send_more(&self) -> bool {
        true
    }

    /// The router's intake accepts frames again after having been congested.
    fn send_next(&self) {}

    /// Individual address this link itself answers to, if any.
    fn address(&self) -> Option<IndividualAddress> {
        None
    }

    /// Whether the device at `addr` is reachable only through this link.
    fn has_address(&self, addr: IndividualAddress) -> bool {
        self.address() == Some(addr)
    }

    /// Group addresses this link owns exclusively.
    fn owned_groups(&self) -> Vec<GroupAddress> {
        Vec::new()
    }

    /// Delivery filter for individually addressed frames.
    fn accepts_individual(&self, _addr: IndividualAddress) -> bool {
        true
    }

    /// Delivery filter for group frames.
    fn accepts_group(&self, _addr: GroupAddress) -> bool {
        true
    }
}

/// A stage wrapped around a link that may rewrite or drop frames.
pub trait Filter: Send + Sync {
    fn name(&self) -> &str;

    /// Frames travelling from the link towards the router.
    fn inbound(&self, frame: LData) -> Option<LData> {
        Some(frame)
    }

    /// Frames travelling from the router towards the link.
    fn outbound(&self, frame: Arc<LData>) -> Option<Arc<LData>> {
        Some(frame)
    }
}

/// The router side of a link, callable from any thread.
///
/// Every method enqueues work for the router's reactor and returns at once.
pub trait Upstream: Send + Sync {
    fn recv_l_data(&self, frame: LData, origin: LinkId);

    fn recv_l_busmonitor(&self, frame: LBusmonitor);

    fn link_state_changed(&self, link: LinkId);

    /// A link that previously refused frames can take more.
    fn send_next(&self);

    /// Whether the router is currently accepting frames from links.
    fn low_send_more(&self) -> bool {
        true
    }
}
