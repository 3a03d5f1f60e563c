use std::sync::Arc;

use knxroute_core::{IndividualAddress, LBusmonitor, LData};
use knxroute_link::{LinkId, Upstream};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};

use crate::error::RouterError;
use crate::observer::BusmonitorObserver;
use crate::pipeline::{FlowGate, Staged, DEFAULT_QUEUE_HIGH_WATER};
use crate::registry::{LinkOptions, LinkStack};

/// Snapshot of the router's lifecycle, published after every reactor pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RouterStatus {
    pub want_up: bool,
    pub some_running: bool,
    pub all_running: bool,
    pub exitcode: i32,
    pub links: usize,
}

pub(crate) enum Control {
    Start,
    Stop(bool),
    SendNext,
    RegisterLink {
        stack: LinkStack,
        options: LinkOptions,
        reply: oneshot::Sender<Result<LinkId, RouterError>>,
    },
    UnregisterLink {
        id: LinkId,
        reply: oneshot::Sender<Result<(), RouterError>>,
    },
    GetClientAddr {
        requester: String,
        reply: oneshot::Sender<Result<IndividualAddress, RouterError>>,
    },
    ReleaseClientAddr(IndividualAddress),
    Observer {
        op: ObserverOp,
        observer: Arc<dyn BusmonitorObserver>,
        reply: oneshot::Sender<bool>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ObserverOp {
    Register { verbose: bool },
    Deregister { verbose: bool },
}

/// Cloneable, thread-safe access to a running router.
///
/// Every method queues work for the reactor; the async ones wait for its
/// answer. Links reach the router through the [`Upstream`] impl.
#[derive(Clone)]
pub struct RouterHandle {
    pub(crate) control: mpsc::UnboundedSender<Control>,
    pub(crate) data: mpsc::UnboundedSender<Staged>,
    pub(crate) busmonitor: mpsc::UnboundedSender<LBusmonitor>,
    pub(crate) changes: mpsc::UnboundedSender<LinkId>,
    pub(crate) flow: Arc<FlowGate>,
    pub(crate) status: watch::Receiver<RouterStatus>,
}

impl RouterHandle {
    /// A handle attached to no reactor. Requests fail with
    /// [`RouterError::ReactorGone`] and notifications go nowhere.
    pub(crate) fn detached() -> Self {
        let (control, _) = mpsc::unbounded_channel();
        let (data, _) = mpsc::unbounded_channel();
        let (busmonitor, _) = mpsc::unbounded_channel();
        let (changes, _) = mpsc::unbounded_channel();
        let (_, status) = watch::channel(RouterStatus::default());
        Self {
            control,
            data,
            busmonitor,
            changes,
            flow: Arc::new(FlowGate::new(DEFAULT_QUEUE_HIGH_WATER)),
            status,
        }
    }

    /// Asks the router to bring every link up.
    pub fn start(&self) {
        self.send(Control::Start);
    }

    /// Asks the router to take every link down. `err` marks a fatal stop.
    pub fn stop(&self, err: bool) {
        self.send(Control::Stop(err));
    }

    pub fn status(&self) -> RouterStatus {
        *self.status.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.status().all_running
    }

    pub fn is_idle(&self) -> bool {
        !self.status().some_running
    }

    /// Status updates, for waiting on readiness.
    pub fn subscribe(&self) -> watch::Receiver<RouterStatus> {
        self.status.clone()
    }

    pub async fn register_link(
        &self,
        stack: LinkStack,
        transient: bool,
    ) -> Result<LinkId, RouterError> {
        let options = LinkOptions {
            transient,
            ..LinkOptions::default()
        };
        self.register_link_with(stack, options).await
    }

    pub async fn register_link_with(
        &self,
        stack: LinkStack,
        options: LinkOptions,
    ) -> Result<LinkId, RouterError> {
        self.request(|reply| Control::RegisterLink {
            stack,
            options,
            reply,
        })
        .await?
    }

    pub async fn unregister_link(&self, id: LinkId) -> Result<(), RouterError> {
        self.request(|reply| Control::UnregisterLink { id, reply })
            .await?
    }

    /// Leases a client address from the configured pool.
    pub async fn get_client_addr(&self, requester: &str) -> Result<IndividualAddress, RouterError> {
        let requester = requester.to_string();
        self.request(|reply| Control::GetClientAddr { requester, reply })
            .await?
    }

    pub fn release_client_addr(&self, addr: IndividualAddress) {
        self.send(Control::ReleaseClientAddr(addr));
    }

    pub async fn register_busmonitor(
        &self,
        observer: Arc<dyn BusmonitorObserver>,
    ) -> Result<bool, RouterError> {
        self.observer(ObserverOp::Register { verbose: false }, observer)
            .await
    }

    pub async fn register_vbusmonitor(
        &self,
        observer: Arc<dyn BusmonitorObserver>,
    ) -> Result<bool, RouterError> {
        self.observer(ObserverOp::Register { verbose: true }, observer)
            .await
    }

    pub async fn deregister_busmonitor(
        &self,
        observer: Arc<dyn BusmonitorObserver>,
    ) -> Result<bool, RouterError> {
        self.observer(ObserverOp::Deregister { verbose: false }, observer)
            .await
    }

    pub async fn deregister_vbusmonitor(
        &self,
        observer: Arc<dyn BusmonitorObserver>,
    ) -> Result<bool, RouterError> {
        self.observer(ObserverOp::Deregister { verbose: true }, observer)
            .await
    }

    async fn observer(
        &self,
        op: ObserverOp,
        observer: Arc<dyn BusmonitorObserver>,
    ) -> Result<bool, RouterError> {
        self.request(|reply| Control::Observer {
            op,
            observer,
            reply,
        })
        .await
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Control,
    ) -> Result<T, RouterError> {
        let (reply, rx) = oneshot::channel();
        self.control
            .send(build(reply))
            .map_err(|_| RouterError::ReactorGone)?;
        rx.await.map_err(|_| RouterError::ReactorGone)
    }

    fn send(&self, control: Control) {
        if self.control.send(control).is_err() {
            log::debug!("router reactor gone, dropping control request");
        }
    }
}

impl std::fmt::Debug for RouterHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterHandle")
            .field("status", &self.status())
            .field("staged", &self.flow.depth())
            .finish()
    }
}

impl Upstream for RouterHandle {
    fn recv_l_data(&self, frame: LData, origin: LinkId) {
        if !self.flow.enqueued() {
            log::debug!("staging queue full, dropping frame from {origin}");
            return;
        }
        if self.data.send(Staged { frame, origin }).is_err() {
            self.flow.dequeued();
            log::trace!("router reactor gone, dropping frame from {origin}");
        }
    }

    fn recv_l_busmonitor(&self, frame: LBusmonitor) {
        if self.busmonitor.send(frame).is_err() {
            log::trace!("router reactor gone, dropping busmonitor frame");
        }
    }

    fn link_state_changed(&self, link: LinkId) {
        if self.changes.send(link).is_err() {
            log::trace!("router reactor gone, dropping state change of {link}");
        }
    }

    fn send_next(&self) {
        self.send(Control::SendNext);
    }

    fn low_send_more(&self) -> bool {
        self.flow.is_open()
    }
}
