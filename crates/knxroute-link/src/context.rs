use core::fmt;
use std::sync::Arc;

use knxroute_core::{LBusmonitor, LData};

use crate::{LinkId, Upstream};

/// A link's handle back to the router, handed over in
/// [`Link::start`](crate::Link::start).
///
/// Cheap to clone; links keep a copy on their own thread.
#[derive(Clone)]
pub struct LinkContext {
    id: LinkId,
    upstream: Arc<dyn Upstream>,
}

impl LinkContext {
    pub fn new(id: LinkId, upstream: Arc<dyn Upstream>) -> Self {
        Self { id, upstream }
    }

    pub fn id(&self) -> LinkId {
        self.id
    }

    /// Hands a received frame to the router.
    pub fn recv_l_data(&self, frame: LData) {
        self.upstream.recv_l_data(frame, self.id);
    }

    pub fn recv_l_busmonitor(&self, frame: LBusmonitor) {
        self.upstream.recv_l_busmonitor(frame);
    }

    /// Reports that [`Link::state`](crate::Link::state) changed.
    pub fn state_changed(&self) {
        self.upstream.link_state_changed(self.id);
    }

    /// Reports that the link accepts frames again.
    pub fn send_next(&self) {
        self.upstream.send_next();
    }

    /// Whether the router wants more frames right now.
    pub fn low_send_more(&self) -> bool {
        self.upstream.low_send_more()
    }
}

impl fmt::Debug for LinkContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkContext").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::LinkContext;
    use crate::testing::{RecordingUpstream, UpstreamCall};
    use crate::LinkId;
    use knxroute_core::{GroupAddress, IndividualAddress, LData};
    use std::sync::Arc;

    #[test]
    fn context_tags_frames_with_link_id() {
        let upstream = Arc::new(RecordingUpstream::default());
        let ctx = LinkContext::new(LinkId::new(3), upstream.clone());
        let frame = LData::group(
            IndividualAddress::new(1, 1, 1),
            GroupAddress::new(0, 0, 1),
            [0x00, 0x80],
        );
        ctx.recv_l_data(frame.clone());
        ctx.state_changed();
        ctx.send_next();

        assert_eq!(
            upstream.calls(),
            vec![
                UpstreamCall::Data(frame, LinkId::new(3)),
                UpstreamCall::StateChanged(LinkId::new(3)),
                UpstreamCall::SendNext,
            ]
        );
        assert!(ctx.low_send_more());
    }
}
