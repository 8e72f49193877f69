//! The clipboard session state machine.
//!
//! A [`ClipboardSession`] walks `Disconnected → Connected → Discovered →
//! Bound → Listening → Closing → Closed`. Each step is a method; calling one
//! out of order is a [`Error::Protocol`].
//!
//! Protocol callbacks run synchronously inside the dispatch call that
//! delivered them. Device events are folded into [`DeviceEvent`] and handled
//! by one function on [`WatchState`].

use super::cancel::{CancelToken, CloseHandle};
use super::offer::{OfferPipe, OfferTable};
use super::registry::GlobalRegistry;
use crate::models::NewClip;
use crate::services::ContentNegotiator;
use crate::{Error, Result};
use std::fmt;
use std::os::unix::net::UnixStream;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::thread;
use wayland_client::backend::ObjectId;
use wayland_client::protocol::wl_registry::{self, WlRegistry};
use wayland_client::protocol::wl_seat::{self, WlSeat};
use wayland_client::{Connection, Dispatch, EventQueue, Proxy, QueueHandle, event_created_child};
use wayland_protocols_wlr::data_control::v1::client::zwlr_data_control_device_v1::{
    self, ZwlrDataControlDeviceV1,
};
use wayland_protocols_wlr::data_control::v1::client::zwlr_data_control_manager_v1::{
    self, ZwlrDataControlManagerV1,
};
use wayland_protocols_wlr::data_control::v1::client::zwlr_data_control_offer_v1::{
    self, ZwlrDataControlOfferV1,
};

/// Lifecycle of a [`ClipboardSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No transport yet.
    Disconnected,
    /// Transport open.
    Connected,
    /// Seat and manager globals found.
    Discovered,
    /// Data device created.
    Bound,
    /// Dispatch loop running.
    Listening,
    /// Releasing protocol objects.
    Closing,
    /// Transport released.
    Closed,
}

impl SessionState {
    /// Lowercase name used in logs and errors.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connected => "connected",
            Self::Discovered => "discovered",
            Self::Bound => "bound",
            Self::Listening => "listening",
            Self::Closing => "closing",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which selection an offer was announced for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionKind {
    /// The regular clipboard.
    Clipboard,
    /// The primary (middle-click) selection.
    Primary,
}

impl SelectionKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Clipboard => "clipboard",
            Self::Primary => "primary",
        }
    }
}

/// Data-device events, as one tagged value.
#[derive(Debug)]
pub enum DeviceEvent {
    /// A new offer object was introduced; mime types follow.
    NewOffer(ZwlrDataControlOfferV1),
    /// The clipboard selection changed. `None` means it was cleared.
    Selection(Option<ZwlrDataControlOfferV1>),
    /// The primary selection changed. `None` means it was cleared.
    PrimarySelection(Option<ZwlrDataControlOfferV1>),
    /// The compositor invalidated the device.
    Finished,
}

impl DeviceEvent {
    fn from_protocol(event: zwlr_data_control_device_v1::Event) -> Option<Self> {
        use zwlr_data_control_device_v1::Event;
        match event {
            Event::DataOffer { id } => Some(Self::NewOffer(id)),
            Event::Selection { id } => Some(Self::Selection(id)),
            Event::PrimarySelection { id } => Some(Self::PrimarySelection(id)),
            Event::Finished => Some(Self::Finished),
            _ => None,
        }
    }
}

/// Everything protocol callbacks read and write.
pub struct WatchState {
    globals: GlobalRegistry,
    offers: OfferTable<ObjectId, ZwlrDataControlOfferV1>,
    negotiator: ContentNegotiator,
    sink: Option<Sender<NewClip>>,
    deferred: Vec<(ZwlrDataControlOfferV1, SelectionKind)>,
    primary_selection: bool,
    stop: Option<Result<()>>,
}

impl WatchState {
    fn new() -> Self {
        Self {
            globals: GlobalRegistry::default(),
            offers: OfferTable::default(),
            negotiator: ContentNegotiator::new(),
            sink: None,
            deferred: Vec::new(),
            primary_selection: true,
            stop: None,
        }
    }

    fn handle_device_event(&mut self, event: DeviceEvent, conn: &Connection) {
        match event {
            DeviceEvent::NewOffer(offer) => {
                tracing::trace!(offer = %offer.id(), "offer opened");
                self.offers.open(offer.id(), offer);
            },
            DeviceEvent::Selection(Some(offer)) => {
                self.resolve(&offer, SelectionKind::Clipboard, conn);
            },
            DeviceEvent::PrimarySelection(Some(offer)) if self.primary_selection => {
                self.resolve(&offer, SelectionKind::Primary, conn);
            },
            DeviceEvent::PrimarySelection(Some(offer)) => self.discard(&offer),
            DeviceEvent::Selection(None) | DeviceEvent::PrimarySelection(None) => {
                tracing::debug!("selection cleared");
            },
            DeviceEvent::Finished => {
                self.stop = Some(Err(Error::Dispatch(
                    "data device finished by compositor".to_string(),
                )));
            },
        }
    }

    /// Negotiates an announced selection, or parks it until a sink exists.
    fn resolve(&mut self, offer: &ZwlrDataControlOfferV1, kind: SelectionKind, conn: &Connection) {
        if self.sink.is_none() {
            if let Some(replaced) = park(&mut self.deferred, offer, kind) {
                tracing::trace!(offer = %replaced.id(), selection = kind.as_str(), "parked selection replaced");
                self.discard(&replaced);
            }
            return;
        }
        let Some(pending) = self.offers.take(&offer.id()) else {
            tracing::warn!(offer = %offer.id(), selection = kind.as_str(), "selection for unknown offer");
            offer.destroy();
            return;
        };

        let mut pipe = OfferPipe::new(&pending.offer, conn, &pending.mimes);
        let negotiated = self.negotiator.negotiate(&mut pipe);
        pending.offer.destroy();

        match negotiated {
            Ok(clip) => self.emit(clip, kind),
            Err(e) => {
                metrics::counter!("negotiation_failures_total", "selection" => kind.as_str())
                    .increment(1);
                tracing::warn!(selection = kind.as_str(), error = %e, "offer skipped");
            },
        }
    }

    fn discard(&mut self, offer: &ZwlrDataControlOfferV1) {
        if let Some(pending) = self.offers.take(&offer.id()) {
            pending.offer.destroy();
        }
    }

    fn emit(&mut self, clip: NewClip, kind: SelectionKind) {
        let Some(sink) = &self.sink else {
            return;
        };
        tracing::debug!(selection = kind.as_str(), mime = %clip.mime, "clip negotiated");
        if sink.send(clip).is_err() {
            tracing::info!("capture consumer gone, stopping");
            self.stop = Some(Ok(()));
        }
    }

    fn flush_deferred(&mut self, conn: &Connection) {
        for (offer, kind) in std::mem::take(&mut self.deferred) {
            self.resolve(&offer, kind, conn);
        }
    }
}

/// Parks `offer` as the pending selection for `kind`.
///
/// Returns the offer it replaced, unless that offer is still parked for the
/// other selection.
fn park<O: Clone + PartialEq>(
    deferred: &mut Vec<(O, SelectionKind)>,
    offer: &O,
    kind: SelectionKind,
) -> Option<O> {
    let replaced = deferred
        .iter()
        .position(|(_, parked)| *parked == kind)
        .map(|index| deferred.remove(index).0);
    deferred.push((offer.clone(), kind));
    replaced.filter(|old| deferred.iter().all(|(other, _)| other != old))
}

impl Dispatch<WlRegistry, ()> for WatchState {
    fn event(
        state: &mut Self,
        _: &WlRegistry,
        event: wl_registry::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        match event {
            wl_registry::Event::Global {
                name,
                interface,
                version,
            } => state.globals.add(name, &interface, version),
            wl_registry::Event::GlobalRemove { name } => state.globals.remove(name),
            _ => {},
        }
    }
}

impl Dispatch<WlSeat, ()> for WatchState {
    fn event(
        _: &mut Self,
        _: &WlSeat,
        _: wl_seat::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<ZwlrDataControlManagerV1, ()> for WatchState {
    fn event(
        _: &mut Self,
        _: &ZwlrDataControlManagerV1,
        _: zwlr_data_control_manager_v1::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<ZwlrDataControlDeviceV1, ()> for WatchState {
    fn event(
        state: &mut Self,
        _: &ZwlrDataControlDeviceV1,
        event: zwlr_data_control_device_v1::Event,
        _: &(),
        conn: &Connection,
        _: &QueueHandle<Self>,
    ) {
        if let Some(event) = DeviceEvent::from_protocol(event) {
            state.handle_device_event(event, conn);
        }
    }

    event_created_child!(WatchState, ZwlrDataControlDeviceV1, [
        zwlr_data_control_device_v1::EVT_DATA_OFFER_OPCODE => (ZwlrDataControlOfferV1, ()),
    ]);
}

impl Dispatch<ZwlrDataControlOfferV1, ()> for WatchState {
    fn event(
        state: &mut Self,
        offer: &ZwlrDataControlOfferV1,
        event: zwlr_data_control_offer_v1::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        if let zwlr_data_control_offer_v1::Event::Offer { mime_type } = event
            && !state.offers.add_mime(&offer.id(), mime_type)
        {
            tracing::debug!(offer = %offer.id(), "mime type for unknown offer");
        }
    }
}

/// A connection to the compositor's data-control protocol.
///
/// # Example
///
/// ```rust,ignore
/// use stashd::wayland::{CancelToken, ClipboardSession};
/// use std::sync::mpsc;
///
/// let mut session = ClipboardSession::new();
/// session.connect()?;
/// session.discover()?;
/// session.bind(true)?;
///
/// let (tx, rx) = mpsc::channel();
/// session.listen(tx, &CancelToken::new())?;
/// ```
pub struct ClipboardSession {
    state: SessionState,
    conn: Option<Connection>,
    queue: Option<EventQueue<WatchState>>,
    registry: Option<WlRegistry>,
    manager: Option<ZwlrDataControlManagerV1>,
    device: Option<ZwlrDataControlDeviceV1>,
    watch: WatchState,
    closed: Arc<AtomicBool>,
}

impl Default for ClipboardSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ClipboardSession {
    /// Creates a disconnected session.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: SessionState::Disconnected,
            conn: None,
            queue: None,
            registry: None,
            manager: None,
            device: None,
            watch: WatchState::new(),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// True once [`ClipboardSession::close`] or a [`CloseHandle`] ran.
    #[must_use]
    pub fn is_closed_by_us(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn transition(&mut self, from: SessionState, to: SessionState) -> Result<()> {
        if self.state != from {
            return Err(Error::Protocol(format!(
                "invalid state transition from {} to {to}",
                self.state
            )));
        }
        tracing::debug!(from = %from, to = %to, "session state");
        self.state = to;
        Ok(())
    }

    fn check(&self, from: SessionState, to: SessionState) -> Result<()> {
        if self.state == from {
            Ok(())
        } else {
            Err(Error::Protocol(format!(
                "invalid state transition from {} to {to}",
                self.state
            )))
        }
    }

    /// Opens the compositor socket named by `WAYLAND_DISPLAY`/`WAYLAND_SOCKET`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the compositor is unreachable.
    pub fn connect(&mut self) -> Result<()> {
        self.check(SessionState::Disconnected, SessionState::Connected)?;
        let conn = Connection::connect_to_env().map_err(|e| Error::Connection(e.to_string()))?;
        self.queue = Some(conn.new_event_queue());
        self.conn = Some(conn);
        self.transition(SessionState::Disconnected, SessionState::Connected)
    }

    /// Enumerates globals with one round-trip.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the data-control manager or a seat is
    /// not advertised, or the round-trip fails.
    pub fn discover(&mut self) -> Result<()> {
        self.check(SessionState::Connected, SessionState::Discovered)?;
        let (Some(conn), Some(queue)) = (&self.conn, &mut self.queue) else {
            return Err(Error::Protocol("session has no transport".to_string()));
        };

        let registry = conn.display().get_registry(&queue.handle(), ());
        queue
            .roundtrip(&mut self.watch)
            .map_err(|e| Error::Protocol(format!("registry round-trip: {e}")))?;
        self.registry = Some(registry);

        if self.watch.globals.manager().is_none() {
            return Err(Error::Protocol("manager not advertised".to_string()));
        }
        if self.watch.globals.seat().is_none() {
            return Err(Error::Protocol("no seat".to_string()));
        }
        self.transition(SessionState::Connected, SessionState::Discovered)
    }

    /// Binds the manager and seat and creates the data device.
    ///
    /// With `primary_selection` off, primary-selection offers are dropped
    /// unread.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bind`] if the globals vanished or the compositor
    /// rejects the requests.
    pub fn bind(&mut self, primary_selection: bool) -> Result<()> {
        self.check(SessionState::Discovered, SessionState::Bound)?;
        let (Some(registry), Some(queue)) = (&self.registry, &mut self.queue) else {
            return Err(Error::Bind("session has no registry".to_string()));
        };
        let (Some(manager_global), Some(seat_global)) =
            (self.watch.globals.manager(), self.watch.globals.seat())
        else {
            return Err(Error::Bind("seat or manager withdrawn".to_string()));
        };

        let qh = queue.handle();
        let manager: ZwlrDataControlManagerV1 = registry.bind(
            manager_global.name,
            manager_global
                .version
                .min(ZwlrDataControlManagerV1::interface().version),
            &qh,
            (),
        );
        let seat: WlSeat = registry.bind(
            seat_global.name,
            seat_global.version.min(WlSeat::interface().version),
            &qh,
            (),
        );
        let device = manager.get_data_device(&seat, &qh, ());

        if primary_selection && manager.version() < 2 {
            tracing::info!(
                version = manager.version(),
                "compositor does not offer primary selection"
            );
        }
        self.watch.primary_selection = primary_selection;
        self.manager = Some(manager);
        self.device = Some(device);

        queue
            .roundtrip(&mut self.watch)
            .map_err(|e| Error::Bind(e.to_string()))?;
        self.transition(SessionState::Discovered, SessionState::Bound)
    }

    /// A handle that closes this session from another thread.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] before [`ClipboardSession::connect`], or
    /// [`Error::Connection`] if the socket cannot be duplicated.
    pub fn close_handle(&self) -> Result<CloseHandle> {
        let conn = self
            .conn
            .as_ref()
            .ok_or_else(|| Error::Protocol("session has no transport".to_string()))?;
        let socket = conn
            .backend()
            .poll_fd()
            .try_clone_to_owned()
            .map_err(|e| Error::Connection(format!("duplicating socket: {e}")))?;
        Ok(CloseHandle::new(
            UnixStream::from(socket),
            Arc::clone(&self.closed),
        ))
    }

    /// Dispatches events until `cancel` fires or dispatch fails.
    ///
    /// Negotiated clips are sent on `sink` as they complete. A selection that
    /// was current when the device was bound is captured first. The session
    /// is closed on return.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Dispatch`] if dispatch fails for any reason other
    /// than our own close, or the compositor finishes the device.
    pub fn listen(&mut self, sink: Sender<NewClip>, cancel: &CancelToken) -> Result<()> {
        self.check(SessionState::Bound, SessionState::Listening)?;
        let closer = self.close_handle()?;
        let watcher = {
            let token = cancel.clone();
            thread::Builder::new()
                .name("stashd-cancel".to_string())
                .spawn(move || {
                    token.wait();
                    closer.close();
                })
                .map_err(|e| Error::Dispatch(format!("spawning cancel watcher: {e}")))?
        };
        self.transition(SessionState::Bound, SessionState::Listening)?;
        self.watch.sink = Some(sink);

        let result = self.dispatch_loop();

        cancel.cancel();
        if watcher.join().is_err() {
            tracing::warn!("cancel watcher panicked");
        }
        self.close();
        result
    }

    fn dispatch_loop(&mut self) -> Result<()> {
        let (Some(conn), Some(queue)) = (&self.conn, &mut self.queue) else {
            return Err(Error::Dispatch("session has no transport".to_string()));
        };
        self.watch.flush_deferred(conn);

        loop {
            if let Some(outcome) = self.watch.stop.take() {
                return outcome;
            }
            if self.closed.load(Ordering::SeqCst) {
                tracing::debug!("closed by request");
                return Ok(());
            }
            match queue.blocking_dispatch(&mut self.watch) {
                Ok(_) => {},
                Err(e) if self.closed.load(Ordering::SeqCst) => {
                    tracing::debug!(error = %e, "dispatch ended by our close");
                    return Ok(());
                },
                Err(e) => return Err(Error::Dispatch(e.to_string())),
            }
        }
    }

    /// Releases every protocol object and the transport.
    ///
    /// Idempotent. The closed-by-us flag is raised before anything is
    /// released.
    pub fn close(&mut self) {
        if matches!(self.state, SessionState::Closing | SessionState::Closed) {
            return;
        }
        self.closed.store(true, Ordering::SeqCst);
        tracing::debug!(from = %self.state, "closing session");
        self.state = SessionState::Closing;

        self.watch.sink = None;
        self.watch.deferred.clear();
        for pending in self.watch.offers.drain() {
            pending.offer.destroy();
        }
        if let Some(device) = self.device.take() {
            device.destroy();
        }
        if let Some(manager) = self.manager.take() {
            manager.destroy();
        }
        if let Some(conn) = &self.conn
            && let Err(e) = conn.flush()
        {
            tracing::debug!(error = %e, "flush on close");
        }
        if let Ok(handle) = self.close_handle() {
            handle.close();
        }

        self.registry = None;
        self.queue = None;
        self.conn = None;
        self.state = SessionState::Closed;
    }
}

impl Drop for ClipboardSession {
    fn drop(&mut self) {
        self.close();
    }
}
