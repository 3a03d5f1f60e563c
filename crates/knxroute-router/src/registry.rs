use std::collections::BTreeMap;
use std::sync::Arc;

use knxroute_core::{GroupAddress, IndividualAddress, LData};
use knxroute_link::{Filter, Link, LinkContext, LinkId, LinkState, Upstream};

/// A link together with the filters wrapped around it.
///
/// `filters[0]` is outermost, i.e. closest to the router.
#[derive(Clone)]
pub struct LinkStack {
    link: Arc<dyn Link>,
    filters: Vec<Arc<dyn Filter>>,
}

impl LinkStack {
    pub fn new(link: Arc<dyn Link>) -> Self {
        Self {
            link,
            filters: Vec::new(),
        }
    }

    /// Adds `filter` inside the filters already present.
    pub fn with_filter(mut self, filter: Arc<dyn Filter>) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn link(&self) -> &Arc<dyn Link> {
        &self.link
    }

    pub fn filters(&self) -> &[Arc<dyn Filter>] {
        &self.filters
    }

    pub fn name(&self) -> &str {
        self.link.name()
    }

    /// Passes a received frame outwards through the filters.
    pub fn inbound(&self, frame: LData) -> Option<LData> {
        self.filters
            .iter()
            .rev()
            .try_fold(frame, |frame, filter| filter.inbound(frame))
    }

    /// Passes a frame bound for the link inwards through the filters.
    pub fn outbound(&self, frame: Arc<LData>) -> Option<Arc<LData>> {
        self.filters
            .iter()
            .try_fold(frame, |frame, filter| filter.outbound(frame))
    }
}

impl std::fmt::Debug for LinkStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let filters: Vec<&str> = self.filters.iter().map(|filter| filter.name()).collect();
        f.debug_struct("LinkStack")
            .field("link", &self.link.name())
            .field("filters", &filters)
            .finish()
    }
}

/// Per-link registration flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkOptions {
    /// Client connections and the like; not counted for readiness.
    pub transient: bool,
    /// A failure of this link does not shut the router down.
    pub ignore: bool,
}

#[derive(Debug)]
pub(crate) struct LinkEntry {
    pub(crate) stack: LinkStack,
    pub(crate) options: LinkOptions,
    pub(crate) ctx: LinkContext,
}

impl LinkEntry {
    pub(crate) fn link(&self) -> &Arc<dyn Link> {
        self.stack.link()
    }

    pub(crate) fn state(&self) -> LinkState {
        self.stack.link().state()
    }

    pub(crate) fn claims(&self, addr: IndividualAddress) -> bool {
        let link = self.link();
        link.address() == Some(addr) || link.has_address(addr)
    }

    pub(crate) fn owns_group(&self, addr: GroupAddress) -> bool {
        self.link().owned_groups().contains(&addr)
    }
}

/// The router's registered links.
///
/// `seq` changes on every insertion and removal so that traversals which
/// call out to links can notice the set changing under them.
#[derive(Debug, Default)]
pub(crate) struct LinkRegistry {
    links: BTreeMap<LinkId, LinkEntry>,
    next_id: u32,
    seq: u64,
    links_changed: bool,
    cleanup: Vec<LinkStack>,
}

impl LinkRegistry {
    pub(crate) fn insert(
        &mut self,
        stack: LinkStack,
        options: LinkOptions,
        upstream: &Arc<dyn Upstream>,
    ) -> LinkId {
        self.next_id += 1;
        let id = LinkId::new(self.next_id);
        let ctx = LinkContext::new(id, upstream.clone());
        self.links.insert(id, LinkEntry { stack, options, ctx });
        self.touch();
        id
    }

    /// Removes the entry. Its stack stays alive on the cleanup queue until
    /// [`take_cleanup`](Self::take_cleanup).
    pub(crate) fn remove(&mut self, id: LinkId) -> Option<LinkOptions> {
        let entry = self.links.remove(&id)?;
        self.cleanup.push(entry.stack);
        self.touch();
        Some(entry.options)
    }

    pub(crate) fn take_cleanup(&mut self) -> Vec<LinkStack> {
        std::mem::take(&mut self.cleanup)
    }

    pub(crate) fn get(&self, id: LinkId) -> Option<&LinkEntry> {
        self.links.get(&id)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (LinkId, &LinkEntry)> {
        self.links.iter().map(|(id, entry)| (*id, entry))
    }

    pub(crate) fn ids(&self) -> Vec<LinkId> {
        self.links.keys().copied().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.links.len()
    }

    pub(crate) fn seq(&self) -> u64 {
        self.seq
    }

    /// Whether the set changed since the last call.
    pub(crate) fn take_changed(&mut self) -> bool {
        std::mem::take(&mut self.links_changed)
    }

    pub(crate) fn contains_link(&self, link: &Arc<dyn Link>) -> bool {
        self.links
            .values()
            .any(|entry| Arc::as_ptr(entry.link()) as *const () == Arc::as_ptr(link) as *const ())
    }

    /// First link other than `excluding` claiming `addr`.
    pub(crate) fn owner_of(
        &self,
        addr: IndividualAddress,
        excluding: Option<LinkId>,
    ) -> Option<LinkId> {
        self.iter()
            .find(|(id, entry)| Some(*id) != excluding && entry.claims(addr))
            .map(|(id, _)| id)
    }

    pub(crate) fn group_owner_of(
        &self,
        addr: GroupAddress,
        excluding: Option<LinkId>,
    ) -> Option<LinkId> {
        self.iter()
            .find(|(id, entry)| Some(*id) != excluding && entry.owns_group(addr))
            .map(|(id, _)| id)
    }

    /// `(some_running, all_running)`.
    ///
    /// All running means at least one link is up and every non-transient
    /// link is up.
    pub(crate) fn running(&self) -> (bool, bool) {
        let some = self.links.values().any(|entry| entry.state().is_up());
        let all = some
            && self
                .links
                .values()
                .filter(|entry| !entry.options.transient)
                .all(|entry| entry.state().is_up());
        (some, all)
    }

    /// No link is running or on its way up or down.
    pub(crate) fn all_down(&self) -> bool {
        self.links.values().all(|entry| entry.state().is_down())
    }

    fn touch(&mut self) {
        self.seq += 1;
        self.links_changed = true;
    }
}
