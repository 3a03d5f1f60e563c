//! In-memory doubles for exercising routers and links without a medium.
//!
//! [`MockLink`] records every frame the router delivers and lets a test
//! drive its lifecycle by hand. [`RecordingUpstream`] stands in for the
//! router when testing a link on its own.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use knxroute_core::{GroupAddress, IndividualAddress, LBusmonitor, LData};

use crate::{AtomicLinkState, Link, LinkContext, LinkError, LinkId, LinkState, Upstream};

/// A scriptable link.
///
/// By default it reports `Up` as soon as it is started and `Down` as soon as
/// it is stopped. [`manual`](MockLink::manual) leaves it in `Starting` until
/// the test calls [`report`](MockLink::report).
#[derive(Debug)]
pub struct MockLink {
    name: String,
    address: Option<IndividualAddress>,
    groups: Vec<GroupAddress>,
    accepted_groups: Option<Vec<GroupAddress>>,
    manual: bool,
    fail_start: bool,
    state: AtomicLinkState,
    send_more: AtomicBool,
    send_next_calls: AtomicUsize,
    sent: Mutex<Vec<Arc<LData>>>,
    ctx: Mutex<Option<LinkContext>>,
}

impl MockLink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: None,
            groups: Vec::new(),
            accepted_groups: None,
            manual: false,
            fail_start: false,
            state: AtomicLinkState::new(LinkState::Down),
            send_more: AtomicBool::new(true),
            send_next_calls: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
            ctx: Mutex::new(None),
        }
    }

    pub fn with_address(mut self, address: IndividualAddress) -> Self {
        self.address = Some(address);
        self
    }

    pub fn with_owned_groups(mut self, groups: Vec<GroupAddress>) -> Self {
        self.groups = groups;
        self
    }

    /// Restricts group delivery to `groups`.
    pub fn accepting_groups(mut self, groups: Vec<GroupAddress>) -> Self {
        self.accepted_groups = Some(groups);
        self
    }

    pub fn manual(mut self) -> Self {
        self.manual = true;
        self
    }

    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    /// Frames delivered so far.
    pub fn sent(&self) -> Vec<Arc<LData>> {
        self.sent.lock().expect("poisoned lock").clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().expect("poisoned lock").len()
    }

    pub fn set_send_more(&self, ready: bool) {
        self.send_more.store(ready, Ordering::Release);
    }

    pub fn send_next_calls(&self) -> usize {
        self.send_next_calls.load(Ordering::Acquire)
    }

    /// The context received in the last `start`.
    pub fn context(&self) -> Option<LinkContext> {
        self.ctx.lock().expect("poisoned lock").clone()
    }

    /// Moves to `state` and notifies the router.
    pub fn report(&self, state: LinkState) {
        self.state.set(state);
        if let Some(ctx) = self.context() {
            ctx.state_changed();
        }
    }

    /// Hands `frame` to the router as if it had been received on the medium.
    pub fn inject(&self, frame: LData) {
        if let Some(ctx) = self.context() {
            ctx.recv_l_data(frame);
        }
    }
}

impl Link for MockLink {
    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> LinkState {
        self.state.get()
    }

    fn start(&self, ctx: &LinkContext) -> Result<(), LinkError> {
        *self.ctx.lock().expect("poisoned lock") = Some(ctx.clone());
        if self.fail_start {
            return Err(LinkError::StartFailed(self.name.clone()));
        }
        let next = if self.manual {
            LinkState::Starting
        } else {
            LinkState::Up
        };
        self.state.set(next);
        ctx.state_changed();
        Ok(())
    }

    fn stop(&self, ctx: &LinkContext) {
        self.state.set(LinkState::Down);
        ctx.state_changed();
    }

    fn send_l_data(&self, frame: Arc<LData>) {
        self.sent.lock().expect("poisoned lock").push(frame);
    }

    fn send_more(&self) -> bool {
        self.send_more.load(Ordering::Acquire)
    }

    fn send_next(&self) {
        self.send_next_calls.fetch_add(1, Ordering::AcqRel);
    }

    fn address(&self) -> Option<IndividualAddress> {
        self.address
    }

    fn owned_groups(&self) -> Vec<GroupAddress> {
        self.groups.clone()
    }

    fn accepts_group(&self, addr: GroupAddress) -> bool {
        self.accepted_groups
            .as_ref()
            .map(|groups| groups.contains(&addr))
            .unwrap_or(true)
    }
}

/// A call made on a [`RecordingUpstream`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamCall {
    Data(LData, LinkId),
    Busmonitor(LBusmonitor),
    StateChanged(LinkId),
    SendNext,
}

/// An [`Upstream`] that only records what it is told.
#[derive(Debug, Default)]
pub struct RecordingUpstream {
    calls: Mutex<Vec<UpstreamCall>>,
}

impl RecordingUpstream {
    pub fn calls(&self) -> Vec<UpstreamCall> {
        self.calls.lock().expect("poisoned lock").clone()
    }

    fn push(&self, call: UpstreamCall) {
        self.calls.lock().expect("poisoned lock").push(call);
    }
}

impl Upstream for RecordingUpstream {
    fn recv_l_data(&self, frame: LData, origin: LinkId) {
        self.push(UpstreamCall::Data(frame, origin));
    }

    fn recv_l_busmonitor(&self, frame: LBusmonitor) {
        self.push(UpstreamCall::Busmonitor(frame));
    }

    fn link_state_changed(&self, link: LinkId) {
        self.push(UpstreamCall::StateChanged(link));
    }

    fn send_next(&self) {
        self.push(UpstreamCall::SendNext);
    }
}

#[cfg(test)]
mod tests {
    use super::{MockLink, RecordingUpstream, UpstreamCall};
    use crate::{Link, LinkContext, LinkId, LinkState};
    use knxroute_core::{GroupAddress, IndividualAddress, LData};
    use std::sync::Arc;

    #[test]
    fn manual_link_waits_for_report() {
        let upstream = Arc::new(RecordingUpstream::default());
        let ctx = LinkContext::new(LinkId::new(9), upstream.clone());
        let link = MockLink::new("m").manual();

        link.start(&ctx).unwrap();
        assert_eq!(link.state(), LinkState::Starting);
        link.report(LinkState::Up);
        assert_eq!(link.state(), LinkState::Up);
        assert_eq!(upstream.calls().len(), 2);
    }

    #[test]
    fn failing_start_keeps_context() {
        let upstream = Arc::new(RecordingUpstream::default());
        let ctx = LinkContext::new(LinkId::new(2), upstream);
        let link = MockLink::new("broken").failing_start();
        assert!(link.start(&ctx).is_err());
        assert_eq!(link.state(), LinkState::Down);
        assert_eq!(link.context().map(|c| c.id()), Some(LinkId::new(2)));
    }

    #[test]
    fn inject_goes_upstream() {
        let upstream = Arc::new(RecordingUpstream::default());
        let ctx = LinkContext::new(LinkId::new(4), upstream.clone());
        let link = MockLink::new("m");
        link.start(&ctx).unwrap();
        let frame = LData::individual(
            IndividualAddress::new(1, 1, 1),
            IndividualAddress::new(1, 1, 2),
            [0x80],
        );
        link.inject(frame.clone());
        assert_eq!(
            upstream.calls().last(),
            Some(&UpstreamCall::Data(frame, LinkId::new(4)))
        );
    }

    #[test]
    fn group_acceptance_is_optional() {
        let open = MockLink::new("open");
        let picky = MockLink::new("picky").accepting_groups(vec![GroupAddress::new(1, 1, 1)]);
        assert!(open.accepts_group(GroupAddress::new(2, 2, 2)));
        assert!(picky.accepts_group(GroupAddress::new(1, 1, 1)));
        assert!(!picky.accepts_group(GroupAddress::new(2, 2, 2)));
    }
}
