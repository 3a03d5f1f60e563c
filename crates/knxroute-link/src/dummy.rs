//! A driver with no medium behind it.
//!
//! [`DummyDriver`] comes up as soon as it is started and discards everything
//! sent to it. Useful as a placeholder connection and for validating filter
//! stacks without hardware.

use std::sync::Arc;

use knxroute_core::{IndividualAddress, LData};

use crate::{AtomicLinkState, Link, LinkContext, LinkError, LinkState};

#[derive(Debug)]
pub struct DummyDriver {
    name: String,
    address: Option<IndividualAddress>,
    state: AtomicLinkState,
}

impl DummyDriver {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: None,
            state: AtomicLinkState::new(LinkState::Down),
        }
    }

    pub fn with_address(mut self, address: IndividualAddress) -> Self {
        self.address = Some(address);
        self
    }
}

impl Link for DummyDriver {
    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> LinkState {
        self.state.get()
    }

    fn start(&self, ctx: &LinkContext) -> Result<(), LinkError> {
        if self.state.set(LinkState::Up) != LinkState::Up {
            ctx.state_changed();
        }
        Ok(())
    }

    fn stop(&self, ctx: &LinkContext) {
        if self.state.set(LinkState::Down) != LinkState::Down {
            ctx.state_changed();
        }
    }

    fn send_l_data(&self, frame: Arc<LData>) {
        log::trace!("{}: discarding {} -> {}", self.name, frame.source, frame.destination);
    }

    fn address(&self) -> Option<IndividualAddress> {
        self.address
    }
}
