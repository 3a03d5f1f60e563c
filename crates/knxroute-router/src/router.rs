use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use knxroute_core::{Destination, GroupAddress, IndividualAddress, LData, LBusmonitor, MAX_HOP_COUNT};
use knxroute_link::{Filter, Link, LinkId, LinkState, Upstream};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use crate::config::{IniData, Section};
use crate::dedup::{DedupFilter, DEFAULT_REPEAT_WINDOW};
use crate::error::{ConfigError, RouterError};
use crate::factory::Factories;
use crate::handle::{Control, ObserverOp, RouterHandle, RouterStatus};
use crate::observer::{BusmonitorObserver, ObserverRegistry};
use crate::pipeline::{build_pipeline, FlowGate, Stage, Staged, DEFAULT_QUEUE_HIGH_WATER};
use crate::pool::AddressPool;
use crate::registry::{LinkOptions, LinkRegistry, LinkStack};

pub const DEFAULT_MAIN_SECTION: &str = "main";
pub const DEFAULT_SERVER_NAME: &str = "knxroute";
pub const DEFAULT_ADDR: IndividualAddress = IndividualAddress::new(0, 0, 1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkKind {
    Driver,
    Server,
}

impl LinkKind {
    fn of(section: &Section) -> Option<Self> {
        if section.contains("driver") {
            Some(Self::Driver)
        } else if section.contains("server") {
            Some(Self::Server)
        } else {
            None
        }
    }
}

#[derive(Debug, Default)]
struct RouterState {
    want_up: bool,
    some_running: bool,
    all_running: bool,
    /// Readiness has been announced at least once.
    running_signal: bool,
    /// A stop is in progress; the flag says whether it is fatal.
    stop_pending: Option<bool>,
    /// The last requested stop has completed.
    stopped: bool,
    /// A link could not be started during the current start pass.
    start_failed: bool,
    exitcode: i32,
}

/// The bus router.
///
/// Owns every registered link and routes frames between them on a single
/// reactor. Other threads talk to it through a [`RouterHandle`]; the
/// reactor itself is driven by [`run`](Router::run), or step by step with
/// [`run_pending`](Router::run_pending).
pub struct Router {
    main: String,
    servername: String,
    addr: IndividualAddress,
    config: IniData,
    factories: Factories,
    setup_ok: Option<bool>,
    unknown_ok: bool,
    force_broadcast: bool,
    pool: Option<AddressPool>,
    dedup: DedupFilter,
    observers: ObserverRegistry,
    registry: LinkRegistry,
    pipeline: Vec<Stage>,
    state: RouterState,
    high_send_more: bool,
    handle: RouterHandle,
    upstream: Arc<dyn Upstream>,
    control_rx: mpsc::UnboundedReceiver<Control>,
    data_rx: mpsc::UnboundedReceiver<Staged>,
    busmonitor_rx: mpsc::UnboundedReceiver<LBusmonitor>,
    changes_rx: mpsc::UnboundedReceiver<LinkId>,
    status_tx: watch::Sender<RouterStatus>,
}

impl Router {
    pub fn new(config: IniData, factories: Factories) -> Self {
        let (control, control_rx) = mpsc::unbounded_channel();
        let (data, data_rx) = mpsc::unbounded_channel();
        let (busmonitor, busmonitor_rx) = mpsc::unbounded_channel();
        let (changes, changes_rx) = mpsc::unbounded_channel();
        let (status_tx, status) = watch::channel(RouterStatus::default());
        let handle = RouterHandle {
            control,
            data,
            busmonitor,
            changes,
            flow: Arc::new(FlowGate::new(DEFAULT_QUEUE_HIGH_WATER)),
            status,
        };
        let upstream: Arc<dyn Upstream> = Arc::new(handle.clone());

        Self {
            main: DEFAULT_MAIN_SECTION.to_string(),
            servername: DEFAULT_SERVER_NAME.to_string(),
            addr: DEFAULT_ADDR,
            config,
            factories,
            setup_ok: None,
            unknown_ok: false,
            force_broadcast: false,
            pool: None,
            dedup: DedupFilter::new(DEFAULT_REPEAT_WINDOW),
            observers: ObserverRegistry::default(),
            registry: LinkRegistry::default(),
            pipeline: build_pipeline(Vec::new()),
            state: RouterState::default(),
            high_send_more: true,
            handle,
            upstream,
            control_rx,
            data_rx,
            busmonitor_rx,
            changes_rx,
            status_tx,
        }
    }

    /// Reads settings from `main` instead of the default section.
    pub fn with_main(mut self, main: impl Into<String>) -> Self {
        self.main = main.into();
        self
    }

    pub fn handle(&self) -> RouterHandle {
        self.handle.clone()
    }

    pub fn servername(&self) -> &str {
        &self.servername
    }

    pub fn addr(&self) -> IndividualAddress {
        self.addr
    }

    pub fn config(&self) -> &IniData {
        &self.config
    }

    /// Applies the main section and builds every link it lists under
    /// `connections`.
    ///
    /// After a failure the router refuses to register links or start.
    pub fn setup(&mut self) -> Result<(), RouterError> {
        let result = self.apply_config();
        match &result {
            Ok(()) => {
                self.setup_ok = Some(true);
                log::info!("{}: router set up at {}", self.servername, self.addr);
            }
            Err(err) => {
                self.setup_ok = Some(false);
                self.state.exitcode += 1;
                log::error!("{}: setup failed: {err}", self.servername);
            }
        }
        self.publish();
        result
    }

    fn apply_config(&mut self) -> Result<(), RouterError> {
        let connections = {
            let main = self
                .config
                .section(&self.main)
                .ok_or_else(|| ConfigError::MissingSection(self.main.clone()))?;
            self.servername = main.get_str_or("name", DEFAULT_SERVER_NAME);
            self.addr = main.get_addr("addr")?.unwrap_or(DEFAULT_ADDR);
            self.pool = main
                .get_addr_block("client-addrs")?
                .map(|(start, len)| AddressPool::new(start, len));
            self.force_broadcast = main.get_bool("force-broadcast", false)?;
            self.unknown_ok = main.get_bool("unknown-ok", false)?;

            let window = main.get_u64("repeat-window-ms", DEFAULT_REPEAT_WINDOW.as_millis() as u64)?;
            self.dedup = DedupFilter::new(Duration::from_millis(window));
            let high_water = main.get_u64("queue-high-water", DEFAULT_QUEUE_HIGH_WATER as u64)?;
            self.handle
                .flow
                .set_high_water(usize::try_from(high_water).unwrap_or(usize::MAX));

            let mut globals = Vec::new();
            for name in main.get_list("filters") {
                globals.push(self.filter_from_config(&self.main, &name)?);
            }
            self.pipeline = build_pipeline(globals);

            let connections = main.get_list("connections");
            if !self.unknown_ok {
                main.check_unused()?;
            }
            connections
        };

        for name in connections {
            self.setup_link(&name)?;
        }
        Ok(())
    }

    // Lifecycle

    /// Queues a request to bring every link up.
    pub fn start(&self) {
        self.handle.start();
    }

    /// Queues a request to take every link down. `err` marks a fatal stop
    /// and raises [`exitcode`](Self::exitcode).
    pub fn stop(&self, err: bool) {
        self.handle.stop(err);
    }

    pub fn is_idle(&self) -> bool {
        !self.state.some_running
    }

    pub fn is_running(&self) -> bool {
        self.state.all_running
    }

    pub fn exitcode(&self) -> i32 {
        self.state.exitcode
    }

    pub fn status(&self) -> RouterStatus {
        RouterStatus {
            want_up: self.state.want_up,
            some_running: self.state.some_running,
            all_running: self.state.all_running,
            exitcode: self.state.exitcode,
            links: self.registry.len(),
        }
    }

    fn start_links(&mut self) {
        if self.setup_ok == Some(false) {
            log::error!("{}: not starting, setup failed", self.servername);
            self.stop_links(false);
            return;
        }
        log::info!("{}: starting {} links", self.servername, self.registry.len());
        self.state.want_up = true;
        self.state.stop_pending = None;
        self.state.stopped = false;
        self.state.start_failed = false;
        self.for_each_link(Self::start_link);
        if std::mem::take(&mut self.state.start_failed) {
            self.stop_links(true);
            return;
        }
        self.update_running();
    }

    fn stop_links(&mut self, err: bool) {
        if err {
            self.state.exitcode += 1;
        }
        log::info!(
            "{}: stopping{}",
            self.servername,
            if err { " after an error" } else { "" }
        );
        self.state.want_up = false;
        self.state.stop_pending = Some(self.state.stop_pending.unwrap_or(false) || err);
        self.for_each_link(Self::stop_link);
        self.update_running();
    }

    fn start_link(&mut self, id: LinkId) {
        let Some(entry) = self.registry.get(id) else {
            return;
        };
        if !entry.state().is_down() {
            return;
        }
        let Err(err) = entry.link().start(&entry.ctx) else {
            return;
        };
        let options = entry.options;
        log::warn!("{} ({id}): start failed: {err}", entry.stack.name());
        if options.transient {
            if let Err(err) = self.unregister_link(id) {
                log::debug!("{id}: {err}");
            }
        } else if !options.ignore {
            self.state.start_failed = true;
        }
    }

    fn stop_link(&mut self, id: LinkId) {
        if let Some(entry) = self.registry.get(id) {
            if !entry.state().is_down() {
                entry.link().stop(&entry.ctx);
            }
        }
    }

    /// Calls `f` once for every registered link.
    ///
    /// `f` may register or unregister links; the walk then restarts on the
    /// new set and skips links it has already visited.
    fn for_each_link(&mut self, mut f: impl FnMut(&mut Self, LinkId)) {
        let mut visited = BTreeSet::new();
        'walk: loop {
            let seq = self.registry.seq();
            for id in self.registry.ids() {
                if !visited.insert(id) {
                    continue;
                }
                f(self, id);
                if self.registry.seq() != seq {
                    continue 'walk;
                }
            }
            break;
        }
    }

    fn link_changed(&mut self, id: LinkId) {
        if let Some(entry) = self.registry.get(id) {
            let state = entry.state();
            let options = entry.options;
            log::debug!("{} ({id}) is {state:?}", entry.stack.name());
            if state == LinkState::Failed && self.state.want_up {
                if options.transient {
                    log::info!("{} ({id}) failed, dropping it", entry.stack.name());
                    if let Err(err) = self.unregister_link(id) {
                        log::debug!("{id}: {err}");
                    }
                } else if options.ignore {
                    log::warn!("{} ({id}) failed, ignored", entry.stack.name());
                } else {
                    log::error!("{} ({id}) failed", entry.stack.name());
                    self.stop_links(true);
                    return;
                }
            }
        }
        self.update_running();
    }

    fn update_running(&mut self) {
        let (some, all) = self.registry.running();
        let was_all = self.state.all_running;
        self.state.some_running = some;
        self.state.all_running = all;

        if self.state.want_up {
            if all && !was_all {
                self.started();
            } else if was_all && !all {
                log::warn!("{}: a link went down", self.servername);
            }
        }
        if self.registry.all_down() {
            if let Some(err) = self.state.stop_pending.take() {
                self.stopped(err);
            }
        }
        self.high_send_more = self.all_send_more();
        self.publish();
    }

    fn started(&mut self) {
        if self.state.running_signal {
            log::info!("{}: all links are up again", self.servername);
        } else {
            self.state.running_signal = true;
            log::info!("{}: ready, all links are up", self.servername);
        }
    }

    fn stopped(&mut self, err: bool) {
        self.state.stopped = true;
        if err {
            log::warn!(
                "{}: stopped after an error (exit code {})",
                self.servername,
                self.state.exitcode
            );
        } else {
            log::info!("{}: stopped", self.servername);
        }
    }

    // Registry

    pub fn register_link(&mut self, stack: LinkStack, transient: bool) -> Result<LinkId, RouterError> {
        let options = LinkOptions {
            transient,
            ..LinkOptions::default()
        };
        self.register_link_with(stack, options)
    }

    /// Adds a link, rejecting it if it claims an address another link (or
    /// the router itself) already has. Starts it at once if the router is up.
    ///
    /// A link that then fails to start is handled as during
    /// [`start`](Self::start): a transient one is dropped again, any other
    /// one not marked `ignore` stops the router with an error.
    pub fn register_link_with(
        &mut self,
        stack: LinkStack,
        options: LinkOptions,
    ) -> Result<LinkId, RouterError> {
        if self.setup_ok == Some(false) {
            return Err(RouterError::SetupFailed);
        }
        let link = stack.link().clone();
        if self.registry.contains_link(&link) {
            return Err(RouterError::AlreadyRegistered(link.name().to_string()));
        }
        if let Some(address) = link.address() {
            if address == self.addr {
                return Err(RouterError::AddressConflict {
                    address,
                    owner: self.servername.clone(),
                });
            }
            if let Some(owner) = self.registry.owner_of(address, None) {
                return Err(RouterError::AddressConflict {
                    address,
                    owner: self.link_name(owner).unwrap_or_default(),
                });
            }
        }
        for address in link.owned_groups() {
            if let Some(owner) = self.registry.group_owner_of(address, None) {
                return Err(RouterError::GroupConflict {
                    address,
                    owner: self.link_name(owner).unwrap_or_default(),
                });
            }
        }

        let id = self.registry.insert(stack, options, &self.upstream);
        log::info!(
            "{}: registered {} as {id}{}",
            self.servername,
            link.name(),
            if options.transient { " (transient)" } else { "" }
        );
        if self.state.want_up {
            self.start_link(id);
            if std::mem::take(&mut self.state.start_failed) {
                self.stop_links(true);
                return Ok(id);
            }
        }
        self.update_running();
        Ok(id)
    }

    /// Removes a link. Frames it staged earlier are dropped when they reach
    /// the front of the queue.
    pub fn unregister_link(&mut self, id: LinkId) -> Result<(), RouterError> {
        let Some(entry) = self.registry.get(id) else {
            return Err(RouterError::NotRegistered(id));
        };
        if !entry.state().is_down() {
            entry.link().stop(&entry.ctx);
        }
        log::info!("{}: unregistered {} ({id})", self.servername, entry.stack.name());
        self.registry.remove(id);
        self.update_running();
        Ok(())
    }

    pub fn link_ids(&self) -> Vec<LinkId> {
        self.registry.ids()
    }

    pub fn link_count(&self) -> usize {
        self.registry.len()
    }

    pub fn link_name(&self, id: LinkId) -> Option<String> {
        self.registry.get(id).map(|entry| entry.stack.name().to_string())
    }

    // Addresses

    /// The link through which `addr` is reached, if any.
    pub fn has_address(&self, addr: IndividualAddress, quiet: bool) -> Option<LinkId> {
        let owner = self.registry.owner_of(addr, None);
        if owner.is_none() && !quiet {
            log::trace!("{}: no link has {addr}", self.servername);
        }
        owner
    }

    /// Whether `addr` is free, ignoring the claims of `excluding`.
    pub fn check_address(&self, addr: IndividualAddress, excluding: Option<LinkId>) -> bool {
        self.registry.owner_of(addr, excluding).is_none()
    }

    pub fn check_group_address(&self, addr: GroupAddress, excluding: Option<LinkId>) -> bool {
        self.registry.group_owner_of(addr, excluding).is_none()
    }

    pub fn has_client_addrs(&self, complain: bool) -> bool {
        let configured = self.pool.as_ref().is_some_and(|pool| !pool.is_empty());
        if !configured && complain {
            log::warn!("{}: no client-addrs configured", self.servername);
        }
        configured
    }

    /// Leases an address for a client connection, skipping the router's own
    /// address and addresses some link already has.
    pub fn get_client_addr(&mut self, requester: &str) -> Result<IndividualAddress, RouterError> {
        if !self.has_client_addrs(true) {
            return Err(RouterError::NoClientPool);
        }
        let own = self.addr;
        let registry = &self.registry;
        let pool = self.pool.as_mut().ok_or(RouterError::NoClientPool)?;
        match pool.allocate(|addr| addr == own || registry.owner_of(addr, None).is_some()) {
            Some(addr) => {
                log::debug!("{requester}: leased client address {addr}");
                Ok(addr)
            }
            None => {
                log::warn!("{requester}: client address pool exhausted");
                Err(RouterError::PoolExhausted)
            }
        }
    }

    pub fn release_client_addr(&mut self, addr: IndividualAddress) {
        if let Some(pool) = self.pool.as_mut() {
            if pool.release(addr) {
                log::debug!("released client address {addr}");
            }
        }
    }

    // Busmonitor

    pub fn register_busmonitor(&mut self, observer: Arc<dyn BusmonitorObserver>) -> bool {
        self.observers.register_busmonitor(observer)
    }

    pub fn register_vbusmonitor(&mut self, observer: Arc<dyn BusmonitorObserver>) -> bool {
        self.observers.register_vbusmonitor(observer)
    }

    pub fn deregister_busmonitor(&mut self, observer: &Arc<dyn BusmonitorObserver>) -> bool {
        self.observers.deregister_busmonitor(observer)
    }

    pub fn deregister_vbusmonitor(&mut self, observer: &Arc<dyn BusmonitorObserver>) -> bool {
        self.observers.deregister_vbusmonitor(observer)
    }

    // Construction from configuration

    /// Builds the filter `name` for the link or section `owner`.
    ///
    /// The filter type comes from the section's `filter` key and defaults
    /// to `name` itself.
    pub fn get_filter(
        &self,
        owner: &str,
        section: &Section,
        name: &str,
    ) -> Result<Arc<dyn Filter>, RouterError> {
        let kind = section.get_str("filter").unwrap_or_else(|| name.to_string());
        let Some(ctor) = self.factories.filters.get(&kind) else {
            log::error!("{owner}: unknown filter '{kind}'");
            return Err(RouterError::UnknownFilter(kind));
        };
        ctor(section).map_err(|err| {
            log::error!("{owner}: filter '{name}': {err}");
            RouterError::Link(err)
        })
    }

    /// Builds and registers the driver described by section `name`.
    pub fn do_driver(&mut self, name: &str) -> Result<LinkId, RouterError> {
        self.build_and_register(name, LinkKind::Driver)
    }

    /// Builds and registers the server described by section `name`.
    pub fn do_server(&mut self, name: &str) -> Result<LinkId, RouterError> {
        self.build_and_register(name, LinkKind::Server)
    }

    /// Builds and registers section `name` as whatever it describes.
    pub fn setup_link(&mut self, name: &str) -> Result<LinkId, RouterError> {
        let section = self
            .config
            .section(name)
            .ok_or_else(|| ConfigError::MissingSection(name.to_string()))?;
        let kind = LinkKind::of(section).ok_or_else(|| RouterError::NoLinkType(name.to_string()))?;
        self.build_and_register(name, kind)
    }

    /// Builds the stack `section` describes and throws it away.
    ///
    /// Server constructors get a handle that reaches no reactor, so nothing
    /// they do with it touches this router.
    pub fn check_stack(&self, section: &Section) -> Result<(), RouterError> {
        let kind = LinkKind::of(section)
            .ok_or_else(|| RouterError::NoLinkType(section.name().to_string()))?;
        let detached = RouterHandle::detached();
        let (stack, _) = self.build_stack(section, kind, &detached)?;
        log::debug!("{}: {stack:?} checks out", section.name());
        Ok(())
    }

    fn build_and_register(&mut self, name: &str, kind: LinkKind) -> Result<LinkId, RouterError> {
        let (stack, options) = {
            let section = self
                .config
                .section(name)
                .ok_or_else(|| ConfigError::MissingSection(name.to_string()))?;
            self.build_stack(section, kind, &self.handle)?
        };
        self.register_link_with(stack, options)
    }

    fn build_stack(
        &self,
        section: &Section,
        kind: LinkKind,
        handle: &RouterHandle,
    ) -> Result<(LinkStack, LinkOptions), RouterError> {
        let link = match kind {
            LinkKind::Driver => {
                let kind = section
                    .get_str("driver")
                    .ok_or_else(|| RouterError::NoLinkType(section.name().to_string()))?;
                let ctor = self
                    .factories
                    .drivers
                    .get(&kind)
                    .ok_or_else(|| RouterError::UnknownDriver(kind.clone()))?;
                ctor(section)?
            }
            LinkKind::Server => {
                let kind = section
                    .get_str("server")
                    .ok_or_else(|| RouterError::NoLinkType(section.name().to_string()))?;
                let ctor = self
                    .factories
                    .servers
                    .get(&kind)
                    .ok_or_else(|| RouterError::UnknownServer(kind.clone()))?;
                ctor(section, handle)?
            }
        };

        // The first listed filter sits right on the link.
        let mut stack = LinkStack::new(link);
        for name in section.get_list("filters").iter().rev() {
            stack = stack.with_filter(self.filter_from_config(section.name(), name)?);
        }
        let options = LinkOptions {
            transient: section.get_bool("transient", false)?,
            ignore: section.get_bool("ignore", false)?,
        };
        if !self.unknown_ok {
            section.check_unused()?;
        }
        Ok((stack, options))
    }

    fn filter_from_config(&self, owner: &str, name: &str) -> Result<Arc<dyn Filter>, RouterError> {
        let empty;
        let section = match self.config.section(name) {
            Some(section) => section,
            None => {
                empty = Section::new(name);
                &empty
            }
        };
        let filter = self.get_filter(owner, section, name)?;
        if !self.unknown_ok {
            section.check_unused()?;
        }
        Ok(filter)
    }

    // Routing

    /// Whether link `id` is registered and can take another frame.
    pub fn has_send_more(&self, id: LinkId) -> bool {
        self.registry
            .get(id)
            .is_some_and(|entry| entry.link().send_more())
    }

    /// Whether every running link can take another frame.
    pub fn all_send_more(&self) -> bool {
        self.registry
            .iter()
            .filter(|(_, entry)| entry.state().is_up())
            .all(|(_, entry)| entry.link().send_more())
    }

    fn dispatch(&mut self, staged: Staged) {
        if self.handle.flow.dequeued() {
            self.wake_links();
        }
        let Staged { mut frame, origin } = staged;
        let now = Instant::now();
        for pos in 0..self.pipeline.len() {
            let next = match self.pipeline[pos].clone() {
                Stage::Low => self.route_low(frame, origin, now),
                Stage::Global(filter) => filter.inbound(frame),
                Stage::High => {
                    self.route_high(frame, origin);
                    return;
                }
            };
            match next {
                Some(next) => frame = next,
                None => return,
            }
        }
    }

    fn route_low(&mut self, frame: LData, origin: LinkId, now: Instant) -> Option<LData> {
        let Some(entry) = self.registry.get(origin) else {
            log::debug!("dropping frame from unregistered link {origin}");
            return None;
        };
        let mut frame = entry.stack.inbound(frame)?;
        if frame.source.is_unset() {
            frame.source = self.addr;
        }
        if let Some(owner) = self.registry.owner_of(frame.source, Some(origin)) {
            log::debug!(
                "{origin}: dropping looped frame from {}, which is behind {owner}",
                frame.source
            );
            return None;
        }
        if frame.hop_count == 0 {
            log::trace!("{origin}: hop count of {} -> {} exhausted", frame.source, frame.destination);
            return None;
        }
        if !self.dedup.admit(&frame, now) {
            log::trace!("{origin}: dropping repeat of {} -> {}", frame.source, frame.destination);
            return None;
        }
        Some(frame)
    }

    fn route_high(&mut self, mut frame: LData, origin: LinkId) {
        let broadcast = self.force_broadcast && frame.hop_count == MAX_HOP_COUNT;
        if !broadcast {
            frame.hop_count = frame.hop_count.saturating_sub(1);
        }
        let frame = Arc::new(frame);
        if self.observers.has_vbusmonitor() {
            self.observers
                .deliver_synthesized(&LBusmonitor::from_data(frame.clone()));
        }

        // An individual address behind a known link is routed only there.
        let target = match frame.destination {
            Destination::Individual(addr) if !broadcast => self.registry.owner_of(addr, None),
            _ => None,
        };

        let mut delivered = 0usize;
        for (id, entry) in self.registry.iter() {
            if id == origin || target.is_some_and(|target| target != id) {
                continue;
            }
            if !entry.state().is_up() {
                continue;
            }
            let link = entry.link();
            if !broadcast && !accepts(link.as_ref(), frame.destination) {
                continue;
            }
            match entry.stack.outbound(frame.clone()) {
                Some(out) => {
                    link.send_l_data(out);
                    delivered += 1;
                }
                None => log::trace!("{id}: frame filtered on the way out"),
            }
        }
        log::trace!(
            "{} -> {} from {origin} delivered to {delivered} links",
            frame.source,
            frame.destination
        );
    }

    fn observe(&self, frame: &LBusmonitor) {
        if self.observers.has_busmonitor() || self.observers.has_vbusmonitor() {
            self.observers.deliver_observed(frame);
        } else {
            log::trace!("{}: no busmonitor attached, dropping record", self.servername);
        }
    }

    fn wake_links(&self) {
        log::debug!("{}: intake open again", self.servername);
        for (_, entry) in self.registry.iter() {
            entry.link().send_next();
        }
    }

    fn send_next(&mut self) {
        self.high_send_more = self.all_send_more();
        if !self.high_send_more {
            log::trace!("{}: links still busy", self.servername);
            return;
        }
        if let Ok(staged) = self.data_rx.try_recv() {
            self.dispatch(staged);
        }
    }

    // Reactor

    fn handle_control(&mut self, control: Control) {
        match control {
            Control::Start => self.start_links(),
            Control::Stop(err) => self.stop_links(err),
            Control::SendNext => self.send_next(),
            Control::RegisterLink {
                stack,
                options,
                reply,
            } => {
                let _ = reply.send(self.register_link_with(stack, options));
            }
            Control::UnregisterLink { id, reply } => {
                let _ = reply.send(self.unregister_link(id));
            }
            Control::GetClientAddr { requester, reply } => {
                let _ = reply.send(self.get_client_addr(&requester));
            }
            Control::ReleaseClientAddr(addr) => self.release_client_addr(addr),
            Control::Observer {
                op,
                observer,
                reply,
            } => {
                let done = match op {
                    ObserverOp::Register { verbose: false } => self.register_busmonitor(observer),
                    ObserverOp::Register { verbose: true } => self.register_vbusmonitor(observer),
                    ObserverOp::Deregister { verbose: false } => {
                        self.deregister_busmonitor(&observer)
                    }
                    ObserverOp::Deregister { verbose: true } => {
                        self.deregister_vbusmonitor(&observer)
                    }
                };
                let _ = reply.send(done);
            }
        }
    }

    /// Processes everything queued so far without waiting, then releases
    /// unregistered links.
    pub fn run_pending(&mut self) {
        loop {
            let mut progress = false;
            while let Ok(control) = self.control_rx.try_recv() {
                self.handle_control(control);
                progress = true;
            }
            while let Ok(id) = self.changes_rx.try_recv() {
                self.link_changed(id);
                progress = true;
            }
            while let Ok(frame) = self.busmonitor_rx.try_recv() {
                self.observe(&frame);
                progress = true;
            }
            loop {
                self.high_send_more = self.all_send_more();
                if !self.high_send_more {
                    break;
                }
                match self.data_rx.try_recv() {
                    Ok(staged) => {
                        self.dispatch(staged);
                        progress = true;
                    }
                    Err(_) => break,
                }
            }
            if !progress {
                break;
            }
        }
        self.cleanup();
        self.publish();
    }

    /// Drives the router until a requested stop has completed. Returns the
    /// exit code.
    pub async fn run(mut self) -> i32 {
        loop {
            self.run_pending();
            if self.state.stopped && !self.state.want_up {
                break;
            }
            tokio::select! {
                Some(control) = self.control_rx.recv() => self.handle_control(control),
                Some(id) = self.changes_rx.recv() => self.link_changed(id),
                Some(frame) = self.busmonitor_rx.recv() => self.observe(&frame),
                Some(staged) = self.data_rx.recv(), if self.high_send_more => self.dispatch(staged),
                else => break,
            }
        }
        log::info!("{}: exiting with code {}", self.servername, self.state.exitcode);
        self.state.exitcode
    }

    fn cleanup(&mut self) {
        let released = self.registry.take_cleanup();
        if !released.is_empty() {
            log::trace!("{}: releasing {} links", self.servername, released.len());
        }
        drop(released);
        if self.registry.take_changed() {
            log::debug!("{}: {} links registered", self.servername, self.registry.len());
        }
    }

    fn publish(&self) {
        self.status_tx.send_replace(self.status());
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("servername", &self.servername)
            .field("addr", &self.addr)
            .field("state", &self.state)
            .field("links", &self.registry.len())
            .finish()
    }
}

fn accepts(link: &dyn Link, destination: Destination) -> bool {
    match destination {
        Destination::Individual(addr) => link.accepts_individual(addr),
        Destination::Group(addr) => link.accepts_group(addr),
    }
}
