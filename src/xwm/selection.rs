//! Bridging of the ICCCM selections to the compositor's data transfers.
//!
//! Three [`XwmSelection`] records (clipboard, primary, drag'n'drop) track who
//! owns the matching X11 selection. When the compositor side owns it, incoming
//! `SelectionRequest`s are answered by streaming data out of a pipe filled by
//! the [`XwmHandler`]; when an X11 client owns it, the compositor pulls data
//! with [`X11Wm::send_selection`], which converts the selection into a
//! property on a throwaway window and streams it back into the provided
//! descriptor. Payloads larger than [`INCR_CHUNK_SIZE`] use the INCR property
//! protocol in both directions.

use std::{
    cmp,
    collections::HashMap,
    fmt,
    os::fd::{AsFd, BorrowedFd, OwnedFd},
    sync::Arc,
    time::Duration,
};

use calloop::{
    generic::Generic,
    timer::{TimeoutAction, Timer},
    Interest, LoopHandle, Mode, PostAction, RegistrationToken,
};
use rustix::{io::Errno, pipe::pipe_with, pipe::PipeFlags};
use tracing::{debug, trace, warn};
use x11rb::{
    connection::Connection as _,
    errors::{ConnectionError, ReplyOrIdError},
    protocol::{
        xfixes::{ConnectionExt as _, SelectionEventMask, SelectionNotifyEvent as XfixesSelectionNotifyEvent},
        xproto::{
            Atom, AtomEnum, ChangeWindowAttributesAux, ConnectionExt as _, CreateWindowAux, EventMask,
            PropMode, Property, PropertyNotifyEvent, Screen, SelectionNotifyEvent, SelectionRequestEvent,
            Window as X11Window, WindowClass, SELECTION_NOTIFY_EVENT,
        },
        Event,
    },
    rust_connection::RustConnection,
    wrapper::ConnectionExt as _,
    CURRENT_TIME,
};

use super::{dnd, Atoms, OwnedX11Window, X11Wm, XwmError, XwmHandler, XwmId};

/// Maximum number of bytes moved per property update.
///
/// Payloads above this size switch to the INCR protocol.
// copied from wlroots - docs say "maximum size can vary widely depending on the implementation"
// and there is no way to query the maximum size, you just get a non-descriptive `Length` error...
pub const INCR_CHUNK_SIZE: usize = 64 * 1024;

/// How long a transfer may sit without making progress before it is aborted.
///
/// The selection protocol specifies no timeout of its own; without one a hung
/// peer would stall its selection until the end of the session. The timer is
/// re-armed whenever bytes or chunks move.
pub const TRANSFER_STEP_TIMEOUT: Duration = Duration::from_secs(5);

/// The selections bridged by an [`X11Wm`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectionTarget {
    /// The clipboard selection
    Clipboard,
    /// The primary selection
    Primary,
    /// The drag-and-drop selection
    Dnd,
}

/// One logical X11 selection and its in-flight transfers.
#[derive(Debug)]
pub(super) struct XwmSelection {
    pub(super) target: SelectionTarget,
    pub(super) atom: Atom,

    pub(super) window: OwnedX11Window,
    pub(super) owner: X11Window,
    pub(super) timestamp: u32,

    // MIME types offered by the wayland source currently backing this
    // selection, None while no source is bound
    pub(super) source_mimes: Option<Vec<String>>,
    pub(super) defer_claim: bool,
    pub(super) claim_pending: bool,

    // keyed by the requestor window
    pub(super) outgoing: HashMap<X11Window, OutgoingTransfer>,
    // keyed by the transfer's own property window
    pub(super) incoming: HashMap<X11Window, IncomingTransfer>,
    // convert_selection sent, waiting for the SelectionNotify reply
    pub(super) pending: HashMap<X11Window, PendingConvert>,
}

impl XwmSelection {
    pub(super) fn new(
        conn: &Arc<RustConnection>,
        screen: &Screen,
        atom: Atom,
        target: SelectionTarget,
    ) -> Result<Self, ReplyOrIdError> {
        let window = conn.generate_id()?;
        conn.create_window(
            screen.root_depth,
            window,
            screen.root,
            0,
            0,
            10,
            10,
            0,
            WindowClass::INPUT_OUTPUT,
            screen.root_visual,
            &CreateWindowAux::new().event_mask(EventMask::PROPERTY_CHANGE),
        )?;
        conn.xfixes_select_selection_input(
            window,
            atom,
            SelectionEventMask::SET_SELECTION_OWNER
                | SelectionEventMask::SELECTION_WINDOW_DESTROY
                | SelectionEventMask::SELECTION_CLIENT_CLOSE,
        )?;
        conn.flush()?;

        debug!(selection_window = window, ?target, atom, "Selection init");

        Ok(XwmSelection {
            target,
            atom,
            window: OwnedX11Window::new(window, conn),
            owner: x11rb::NONE,
            timestamp: x11rb::CURRENT_TIME,
            source_mimes: None,
            defer_claim: false,
            claim_pending: false,
            outgoing: HashMap::new(),
            incoming: HashMap::new(),
            pending: HashMap::new(),
        })
    }

    /// Whether `window` is owned by this selection record.
    ///
    /// Requestor windows of outgoing transfers are real client windows and do
    /// not count.
    pub(super) fn has_window(&self, window: X11Window) -> bool {
        self.window == window || self.incoming.contains_key(&window) || self.pending.contains_key(&window)
    }

    /// Cancel every outgoing transfer, refusing requests that were never
    /// answered. The event sources are reaped on their next wakeup.
    pub(super) fn cancel_outgoing(&mut self, conn: &RustConnection) {
        for transfer in self.outgoing.values_mut() {
            if transfer.mark_cancelled() {
                trace!(
                    requestor = transfer.request.requestor,
                    "Cancelling outgoing transfer"
                );
                transfer.refuse_once(conn);
            }
        }
    }
}

/// A `convert_selection` request waiting for the owner's `SelectionNotify`.
#[derive(Debug)]
pub(super) struct PendingConvert {
    pub(super) window: OwnedX11Window,
    pub(super) fd: OwnedFd,
    pub(super) mime: String,
    pub(super) timeout: Option<RegistrationToken>,
}

/// Data travelling from an X11 selection owner towards a wayland descriptor.
pub(super) struct IncomingTransfer {
    pub(super) token: Option<RegistrationToken>,
    pub(super) timeout: Option<RegistrationToken>,
    pub(super) window: OwnedX11Window,

    pub(super) incr: bool,
    /// The zero-length terminal chunk was received
    pub(super) incr_done: bool,
    pub(super) progress: usize,
    pub(super) buffer: Vec<u8>,
}

impl fmt::Debug for IncomingTransfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IncomingTransfer")
            .field("token", &self.token)
            .field("timeout", &self.timeout)
            .field("window", &self.window)
            .field("incr", &self.incr)
            .field("incr_done", &self.incr_done)
            .field("progress", &self.progress)
            .field("buffered", &self.buffer.len())
            .finish()
    }
}

impl IncomingTransfer {
    pub(super) fn accumulate(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
        self.progress += 1;
    }

    /// Drain as much of the buffer as the descriptor accepts right now.
    ///
    /// Returns `Ok(true)` once the buffer is empty.
    pub(super) fn write_out(&mut self, fd: BorrowedFd<'_>) -> std::io::Result<bool> {
        while !self.buffer.is_empty() {
            match rustix::io::write(fd, &self.buffer) {
                Ok(0) => break,
                Ok(len) => {
                    self.buffer.drain(..len);
                    self.progress += 1;
                }
                Err(err) if err == Errno::AGAIN || err == Errno::INTR => return Ok(false),
                Err(err) => return Err(err.into()),
            }
        }
        Ok(self.buffer.is_empty())
    }

    pub(super) fn destroy<D>(mut self, handle: &LoopHandle<'_, D>) {
        if let Some(token) = self.token.take() {
            handle.remove(token);
        }
        if let Some(token) = self.timeout.take() {
            handle.remove(token);
        }
    }
}

impl Drop for IncomingTransfer {
    fn drop(&mut self) {
        if self.token.is_some() {
            warn!(?self, "IncomingTransfer freed before being removed from EventLoop");
        }
    }
}

/// Data travelling from a wayland source towards an X11 requestor.
#[derive(Debug)]
pub(super) struct OutgoingTransfer {
    pub(super) token: Option<RegistrationToken>,
    pub(super) timeout: Option<RegistrationToken>,

    pub(super) incr: bool,
    pub(super) buffer: Vec<u8>,
    pub(super) request: SelectionRequestEvent,

    /// A chunk is set on the requestor, waiting to be read and deleted
    pub(super) property_set: bool,
    /// The next property delete must be answered with another chunk
    pub(super) flush_property_on_delete: bool,
    /// The source descriptor reached end-of-file
    pub(super) source_done: bool,
    /// The final zero-length chunk went out, the transfer is complete
    pub(super) sent_finished: bool,
    /// A terminal SelectionNotify (success or refusal) was sent
    pub(super) notified: bool,
    /// The wayland source was replaced, no further data may be sent
    pub(super) cancelled: bool,
    /// The requestor is a managed window whose event mask must survive
    pub(super) requestor_tracked: bool,
    pub(super) progress: usize,
}

impl OutgoingTransfer {
    pub(super) fn new(request: SelectionRequestEvent, requestor_tracked: bool) -> Self {
        OutgoingTransfer {
            token: None,
            timeout: None,
            incr: false,
            buffer: Vec::new(),
            request,
            property_set: false,
            flush_property_on_delete: false,
            source_done: false,
            sent_finished: false,
            notified: false,
            cancelled: false,
            requestor_tracked,
            progress: 0,
        }
    }

    /// Write the next chunk into the requestor's property.
    ///
    /// An empty chunk marks the end of an incremental transfer. Returns the
    /// number of bytes still buffered.
    pub(super) fn flush_data(&mut self, conn: &RustConnection) -> Result<usize, ReplyOrIdError> {
        let chunk = take_chunk(&mut self.buffer);
        if chunk.is_empty() {
            self.sent_finished = true;
        }
        conn.change_property8(
            PropMode::REPLACE,
            self.request.requestor,
            self.request.property,
            self.request.target,
            &chunk,
        )?;
        conn.flush()?;
        self.property_set = true;
        self.progress += 1;
        Ok(self.buffer.len())
    }

    /// Flag the transfer as cancelled; true if it was still live.
    pub(super) fn mark_cancelled(&mut self) -> bool {
        !std::mem::replace(&mut self.cancelled, true)
    }

    /// Send a refusal to the requestor unless it was already notified.
    pub(super) fn refuse_once(&mut self, conn: &RustConnection) {
        if !self.notified {
            self.notified = true;
            let _ = send_selection_notify_resp(conn, &self.request, false);
        }
    }

    pub(super) fn destroy<D>(mut self, handle: &LoopHandle<'_, D>) {
        if let Some(token) = self.token.take() {
            handle.remove(token);
        }
        if let Some(token) = self.timeout.take() {
            handle.remove(token);
        }
    }
}

impl Drop for OutgoingTransfer {
    fn drop(&mut self) {
        if self.token.is_some() {
            warn!(?self, "OutgoingTransfer freed before being removed from EventLoop");
        }
    }
}

/// Split the next chunk (at most [`INCR_CHUNK_SIZE`] bytes) off the front.
fn take_chunk(buffer: &mut Vec<u8>) -> Vec<u8> {
    let len = cmp::min(buffer.len(), INCR_CHUNK_SIZE);
    let mut chunk = buffer.split_off(len);
    std::mem::swap(&mut chunk, buffer);
    chunk
}

pub(super) fn send_selection_notify_resp(
    conn: &RustConnection,
    req: &SelectionRequestEvent,
    success: bool,
) -> Result<(), ConnectionError> {
    conn.send_event(
        false,
        req.requestor,
        EventMask::NO_EVENT,
        SelectionNotifyEvent {
            response_type: SELECTION_NOTIFY_EVENT,
            sequence: 0,
            time: req.time,
            requestor: req.requestor,
            selection: req.selection,
            target: req.target,
            property: if success {
                req.property
            } else {
                AtomEnum::NONE.into()
            },
        },
    )?;
    conn.flush()?;
    Ok(())
}

/// What a `SelectionRequest` asks of us.
#[derive(Debug, PartialEq, Eq)]
pub(super) enum RequestAction {
    Refuse,
    SendTargets,
    SendTimestamp,
    SendData(String),
}

pub(super) fn classify_request(
    atoms: &Atoms,
    source_mimes: Option<&[String]>,
    target: Atom,
    resolved_mime: Option<String>,
) -> RequestAction {
    let Some(mimes) = source_mimes else {
        return RequestAction::Refuse;
    };
    if target == atoms.TARGETS {
        return RequestAction::SendTargets;
    }
    if target == atoms.TIMESTAMP {
        return RequestAction::SendTimestamp;
    }
    match resolved_mime {
        Some(mime) if mimes.iter().any(|m| *m == mime) => RequestAction::SendData(mime),
        _ => RequestAction::Refuse,
    }
}

fn well_known_atom(atoms: &Atoms, mime: &str) -> Option<Atom> {
    match mime {
        "text/plain;charset=utf-8" | "UTF8_STRING" => Some(atoms.UTF8_STRING),
        "text/plain" => Some(atoms.TEXT),
        _ => None,
    }
}

fn well_known_mime(atoms: &Atoms, atom: Atom) -> Option<&'static str> {
    if atom == atoms.UTF8_STRING {
        Some("text/plain;charset=utf-8")
    } else if atom == atoms.TEXT || atom == u32::from(AtomEnum::STRING) {
        Some("text/plain")
    } else {
        None
    }
}

/// Read a whole property, tracking the read offset across chunk-sized
/// partial reads. With `delete` the property is removed by the final read,
/// which for INCR transfers asks the owner for the next chunk.
fn fetch_property(
    conn: &RustConnection,
    window: X11Window,
    property: Atom,
    delete: bool,
) -> Result<Vec<u8>, ReplyOrIdError> {
    let mut data = Vec::new();
    let mut offset = 0u32; // in 32-bit units
    loop {
        let reply = conn
            .get_property(
                delete,
                window,
                property,
                AtomEnum::ANY,
                offset,
                (INCR_CHUNK_SIZE / 4) as u32,
            )?
            .reply()?;
        let len = reply.value.len();
        data.extend_from_slice(&reply.value);
        if reply.bytes_after == 0 || len == 0 {
            break;
        }
        offset += (len / 4) as u32;
    }
    Ok(data)
}

impl X11Wm {
    pub(super) fn selections_mut(&mut self) -> [&mut XwmSelection; 3] {
        [&mut self.clipboard, &mut self.primary, &mut self.dnd.selection]
    }

    pub(super) fn selection_mut(&mut self, target: SelectionTarget) -> &mut XwmSelection {
        match target {
            SelectionTarget::Clipboard => &mut self.clipboard,
            SelectionTarget::Primary => &mut self.primary,
            SelectionTarget::Dnd => &mut self.dnd.selection,
        }
    }

    pub(super) fn selection_by_atom_mut(&mut self, atom: Atom) -> Option<&mut XwmSelection> {
        self.selections_mut().into_iter().find(|s| s.atom == atom)
    }

    /// Translate a MIME type to the atom advertised for it on the X11 side.
    ///
    /// Unknown types are interned by name; the mapping is cached for the
    /// lifetime of the session.
    pub(super) fn mime_to_atom(&mut self, mime: &str) -> Result<Atom, ReplyOrIdError> {
        if let Some(atom) = well_known_atom(&self.atoms, mime) {
            return Ok(atom);
        }
        if let Some(atom) = self.mime_atoms.get(mime) {
            return Ok(*atom);
        }
        let atom = self.conn.intern_atom(false, mime.as_bytes())?.reply()?.atom;
        self.mime_atoms.insert(mime.to_string(), atom);
        self.atom_mimes.entry(atom).or_insert_with(|| mime.to_string());
        Ok(atom)
    }

    /// Translate a target atom back to a MIME type, `None` for atoms that do
    /// not name a data format.
    pub(super) fn mime_from_atom(&mut self, atom: Atom) -> Result<Option<String>, ReplyOrIdError> {
        if atom == x11rb::NONE
            || atom == self.atoms.TARGETS
            || atom == self.atoms.TIMESTAMP
            || atom == self.atoms.INCR
        {
            return Ok(None);
        }
        if let Some(mime) = well_known_mime(&self.atoms, atom) {
            return Ok(Some(mime.to_string()));
        }
        if let Some(mime) = self.atom_mimes.get(&atom) {
            return Ok(Some(mime.clone()));
        }
        let reply = match self.conn.get_atom_name(atom)?.reply_unchecked() {
            Ok(Some(reply)) => reply,
            Ok(None) => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let Ok(name) = String::from_utf8(reply.name) else {
            return Ok(None);
        };
        self.atom_mimes.insert(atom, name.clone());
        self.mime_atoms.entry(name.clone()).or_insert(atom);
        Ok(Some(name))
    }

    /// Update the wayland side of a selection.
    ///
    /// `Some(mime_types)` binds a new data source and claims the X11
    /// selection (deferred until keyboard focus if so configured); `None`
    /// drops the source and releases a held selection. Either way, transfers
    /// still serving the previous source are cancelled before any of their
    /// remaining data could go out.
    pub fn new_selection(
        &mut self,
        selection: SelectionTarget,
        mime_types: Option<Vec<String>>,
    ) -> Result<(), ConnectionError> {
        let conn = self.conn.clone();
        let focused = self.focused_window.is_some();
        let sel = self.selection_mut(selection);
        sel.cancel_outgoing(&conn);
        match mime_types {
            Some(mimes) => {
                trace!(?selection, ?mimes, "Wayland side provides the selection");
                sel.source_mimes = Some(mimes);
                if sel.defer_claim && !focused {
                    sel.claim_pending = true;
                } else {
                    sel.claim_pending = false;
                    conn.set_selection_owner(*sel.window, sel.atom, CURRENT_TIME)?;
                    conn.flush()?;
                }
            }
            None => {
                sel.source_mimes = None;
                sel.claim_pending = false;
                if sel.owner == *sel.window {
                    conn.set_selection_owner(x11rb::NONE, sel.atom, CURRENT_TIME)?;
                    conn.flush()?;
                }
            }
        }
        Ok(())
    }

    /// Request selection contents from the current X11 owner.
    ///
    /// The data for `mime_type` is streamed into `fd` as it arrives; `fd` is
    /// closed when the transfer completes or fails.
    pub fn send_selection<D>(
        &mut self,
        selection: SelectionTarget,
        mime_type: String,
        fd: OwnedFd,
        handle: LoopHandle<'static, D>,
    ) -> Result<(), XwmError>
    where
        D: XwmHandler + 'static,
    {
        let id = self.id;
        let conn = self.conn.clone();
        let atoms = self.atoms;
        let target_atom = self.mime_to_atom(&mime_type)?;
        let (root, depth, visual) = (self.screen.root, self.screen.root_depth, self.screen.root_visual);

        let sel = self.selection_mut(selection);
        if sel.owner == x11rb::NONE || sel.window == sel.owner {
            return Err(XwmError::SelectionUnavailable(selection));
        }
        let sel_atom = sel.atom;

        // a throwaway window per conversion keeps concurrent transfers apart
        let win = conn.generate_id()?;
        conn.create_window(
            depth,
            win,
            root,
            0,
            0,
            10,
            10,
            0,
            WindowClass::INPUT_OUTPUT,
            visual,
            &CreateWindowAux::new().event_mask(EventMask::PROPERTY_CHANGE),
        )?;
        let time = if sel.timestamp == 0 { CURRENT_TIME } else { sel.timestamp };
        conn.convert_selection(win, sel_atom, target_atom, atoms._WL_SELECTION, time)?;
        conn.flush()?;
        trace!(?selection, mime = %mime_type, window = win, "Converting X11 selection");

        let timeout = arm_pending_timeout(&handle, id, sel_atom, win);
        sel.pending.insert(
            win,
            PendingConvert {
                window: OwnedX11Window::new(win, &conn),
                fd,
                mime: mime_type,
                timeout,
            },
        );
        Ok(())
    }

    /// Configure whether claiming the X11 selection waits for keyboard focus.
    ///
    /// Some X11 clients only observe selection changes while focused; with
    /// the flag set, ownership updates triggered by [`X11Wm::new_selection`]
    /// are held back until an X11 window gains focus.
    pub fn set_defer_selection_claim(
        &mut self,
        selection: SelectionTarget,
        defer: bool,
    ) -> Result<(), ConnectionError> {
        let conn = self.conn.clone();
        let sel = self.selection_mut(selection);
        sel.defer_claim = defer;
        if !defer && sel.claim_pending && sel.source_mimes.is_some() {
            sel.claim_pending = false;
            conn.set_selection_owner(*sel.window, sel.atom, CURRENT_TIME)?;
            conn.flush()?;
        }
        Ok(())
    }

    /// Claim selections whose ownership update waited for keyboard focus.
    pub(super) fn claim_deferred_selections(&mut self) -> Result<(), ConnectionError> {
        let conn = self.conn.clone();
        let mut claimed = false;
        for sel in self.selections_mut() {
            if sel.claim_pending && sel.source_mimes.is_some() {
                sel.claim_pending = false;
                claimed = true;
                debug!(target = ?sel.target, "Claiming deferred selection after focus change");
                conn.set_selection_owner(*sel.window, sel.atom, CURRENT_TIME)?;
            }
        }
        if claimed {
            conn.flush()?;
        }
        Ok(())
    }
}

/// Drop every transfer involving `window`, typically because the window was
/// destroyed.
pub(super) fn cleanup_requestor<D>(xwm: &mut X11Wm, handle: &LoopHandle<'static, D>, window: X11Window) {
    for sel in xwm.selections_mut() {
        if let Some(mut transfer) = sel.outgoing.remove(&window) {
            trace!(requestor = window, "Dropping transfer, requestor disappeared");
            transfer.cancelled = true;
            transfer.destroy(handle);
        }
        if let Some(transfer) = sel.incoming.remove(&window) {
            transfer.destroy(handle);
        }
        if let Some(mut pending) = sel.pending.remove(&window) {
            if let Some(token) = pending.timeout.take() {
                handle.remove(token);
            }
        }
    }
}

/// Events the selection engine consumes before window dispatch gets a look.
///
/// Returns `true` when the event was selection business and is done with.
pub(super) fn handle_selection_event<D: XwmHandler + 'static>(
    state: &mut D,
    handle: &LoopHandle<'static, D>,
    id: XwmId,
    event: &Event,
) -> Result<bool, ReplyOrIdError> {
    match event {
        Event::SelectionRequest(req) => {
            handle_selection_request(state, handle, id, req)?;
            Ok(true)
        }
        Event::SelectionNotify(n) => {
            handle_selection_notify(state, handle, id, n)?;
            Ok(true)
        }
        Event::SelectionClear(n) => {
            let xwm = state.xwm_state(id);
            let conn = xwm.conn.clone();
            if let Some(sel) = xwm.selection_by_atom_mut(n.selection) {
                debug!(target = ?sel.target, "Lost X11 selection ownership");
                sel.cancel_outgoing(&conn);
                sel.source_mimes = None;
                sel.claim_pending = false;
            }
            Ok(true)
        }
        Event::XfixesSelectionNotify(n) => {
            let xwm = state.xwm_state(id);
            if n.selection == xwm.atoms.XdndSelection {
                // the dnd module drives its own ownership changes
                return Ok(false);
            }
            if xwm.selection_by_atom_mut(n.selection).is_none() {
                return Ok(false);
            }
            handle_xfixes_notify(state, id, n)?;
            Ok(true)
        }
        Event::PropertyNotify(n) => handle_property_notify(state, handle, id, n),
        _ => Ok(false),
    }
}

/// An X11 client asks for the contents of a selection we own.
fn handle_selection_request<D: XwmHandler + 'static>(
    state: &mut D,
    handle: &LoopHandle<'static, D>,
    id: XwmId,
    req: &SelectionRequestEvent,
) -> Result<(), ReplyOrIdError> {
    let xwm = state.xwm_state(id);
    let conn = xwm.conn.clone();
    let atoms = xwm.atoms;

    let Some(sel) = xwm.selection_by_atom_mut(req.selection) else {
        debug!(selection = req.selection, "Refusing request for unknown selection");
        send_selection_notify_resp(&conn, req, false)?;
        return Ok(());
    };
    let target = sel.target;
    let timestamp = sel.timestamp;
    let mimes = sel.source_mimes.clone();

    let resolved = if req.target == atoms.TARGETS || req.target == atoms.TIMESTAMP {
        None
    } else {
        xwm.mime_from_atom(req.target)?
    };

    match classify_request(&atoms, mimes.as_deref(), req.target, resolved) {
        RequestAction::Refuse => {
            debug!(target = req.target, requestor = req.requestor, "Refusing selection request");
            send_selection_notify_resp(&conn, req, false)?;
        }
        RequestAction::SendTargets => {
            let mut targets = vec![atoms.TARGETS, atoms.TIMESTAMP];
            for mime in mimes.unwrap_or_default() {
                targets.push(xwm.mime_to_atom(&mime)?);
            }
            conn.change_property32(
                PropMode::REPLACE,
                req.requestor,
                req.property,
                AtomEnum::ATOM,
                &targets,
            )?;
            send_selection_notify_resp(&conn, req, true)?;
        }
        RequestAction::SendTimestamp => {
            conn.change_property32(
                PropMode::REPLACE,
                req.requestor,
                req.property,
                AtomEnum::INTEGER,
                &[timestamp],
            )?;
            send_selection_notify_resp(&conn, req, true)?;
        }
        RequestAction::SendData(mime) => {
            if !state.allow_selection_access(id, target) {
                debug!(?target, requestor = req.requestor, "Compositor denied selection access");
                send_selection_notify_resp(&conn, req, false)?;
                return Ok(());
            }
            let (read_fd, write_fd) = match pipe_with(PipeFlags::CLOEXEC | PipeFlags::NONBLOCK) {
                Ok(pipe) => pipe,
                Err(err) => {
                    warn!(?err, "Failed to create a transfer pipe");
                    send_selection_notify_resp(&conn, req, false)?;
                    return Ok(());
                }
            };
            state.send_selection(id, target, mime, write_fd);

            let xwm = state.xwm_state(id);
            let tracked = xwm.windows.iter().any(|w| w.window_id() == req.requestor);
            let Some(sel) = xwm.selection_by_atom_mut(req.selection) else {
                send_selection_notify_resp(&conn, req, false)?;
                return Ok(());
            };
            // a second request from the same window replaces the first
            if let Some(mut old) = sel.outgoing.remove(&req.requestor) {
                warn!(requestor = req.requestor, "Replacing a transfer that was still in flight");
                old.cancelled = true;
                old.refuse_once(&conn);
                old.destroy(handle);
            }

            let mut transfer = OutgoingTransfer::new(*req, tracked);
            let sel_atom = req.selection;
            let requestor = req.requestor;
            let loop_handle = handle.clone();
            match handle.insert_source(Generic::new(read_fd, Interest::READ, Mode::Level), move |_, fd, state: &mut D| {
                outgoing_ready(state, &loop_handle, id, sel_atom, requestor, fd.as_fd())
            }) {
                Ok(token) => transfer.token = Some(token),
                Err(err) => {
                    warn!(?err, "Failed to register the transfer source");
                    transfer.refuse_once(&conn);
                    return Ok(());
                }
            }
            transfer.timeout = arm_transfer_timeout(handle, id, sel_atom, TransferDirection::Outgoing, requestor);
            sel.outgoing.insert(requestor, transfer);
        }
    }
    Ok(())
}

enum OutgoingAction {
    Done,
    DoneReading,
    WaitForReadable,
}

/// Pull bytes off the wayland source and move them towards the requestor.
fn read_source(
    conn: &RustConnection,
    atoms: &Atoms,
    fd: BorrowedFd<'_>,
    transfer: &mut OutgoingTransfer,
) -> Result<OutgoingAction, ReplyOrIdError> {
    let mut buf = [0; INCR_CHUNK_SIZE];
    let len = match rustix::io::read(fd, &mut buf) {
        Ok(len) => len,
        Err(err) if err == Errno::AGAIN || err == Errno::INTR => {
            return Ok(OutgoingAction::WaitForReadable)
        }
        Err(err) => {
            debug!(
                requestor = transfer.request.requestor,
                ?err,
                "Source descriptor failed, aborting transfer"
            );
            transfer.refuse_once(conn);
            return Ok(OutgoingAction::Done);
        }
    };
    trace!(
        requestor = transfer.request.requestor,
        "Transfer became readable, read {} bytes",
        len
    );

    transfer.buffer.extend_from_slice(&buf[..len]);
    transfer.progress += 1;
    if transfer.buffer.len() >= INCR_CHUNK_SIZE {
        if !transfer.incr {
            trace!(requestor = transfer.request.requestor, "Transfer became incremental");
            // property deletes on the requestor drive the chunking from here
            // on; managed windows already carry this subscription
            if !transfer.requestor_tracked {
                conn.change_window_attributes(
                    transfer.request.requestor,
                    &ChangeWindowAttributesAux::new().event_mask(EventMask::PROPERTY_CHANGE),
                )?;
            }
            conn.change_property32(
                PropMode::REPLACE,
                transfer.request.requestor,
                transfer.request.property,
                atoms.INCR,
                &[INCR_CHUNK_SIZE as u32],
            )?;
            conn.flush()?;
            transfer.incr = true;
            transfer.property_set = true;
            transfer.flush_property_on_delete = true;
            transfer.notified = true;
            send_selection_notify_resp(conn, &transfer.request, true)?;
        } else if transfer.property_set {
            // got more bytes, waiting for the requestor to delete the chunk
            transfer.flush_property_on_delete = true;
        } else {
            let remaining = transfer.flush_data(conn)?;
            trace!(
                requestor = transfer.request.requestor,
                remaining,
                "Sent data chunk"
            );
        }
    }

    if len == 0 {
        if transfer.incr {
            debug!(requestor = transfer.request.requestor, "Source drained, finishing incremental transfer");
            if !transfer.property_set {
                transfer.flush_data(conn)?;
            }
            transfer.flush_property_on_delete = true;
            Ok(OutgoingAction::DoneReading)
        } else {
            let len = transfer.flush_data(conn)?;
            debug!(
                requestor = transfer.request.requestor,
                "Transfer completed in one property, {} bytes left over",
                len
            );
            transfer.notified = true;
            send_selection_notify_resp(conn, &transfer.request, true)?;
            Ok(OutgoingAction::Done)
        }
    } else {
        Ok(OutgoingAction::WaitForReadable)
    }
}

fn outgoing_ready<D: XwmHandler + 'static>(
    state: &mut D,
    handle: &LoopHandle<'static, D>,
    id: XwmId,
    sel_atom: Atom,
    requestor: X11Window,
    fd: BorrowedFd<'_>,
) -> std::io::Result<PostAction> {
    let xwm = state.xwm_state(id);
    let conn = xwm.conn.clone();
    let atoms = xwm.atoms;
    let Some(sel) = xwm.selection_by_atom_mut(sel_atom) else {
        return Ok(PostAction::Remove);
    };
    let Some(transfer) = sel.outgoing.get_mut(&requestor) else {
        return Ok(PostAction::Remove);
    };
    if transfer.cancelled {
        if let Some(mut transfer) = sel.outgoing.remove(&requestor) {
            release_requestor(&conn, &transfer);
            transfer.token = None;
            transfer.destroy(handle);
        }
        return Ok(PostAction::Remove);
    }

    match read_source(&conn, &atoms, fd, transfer) {
        Ok(OutgoingAction::WaitForReadable) => Ok(PostAction::Continue),
        Ok(OutgoingAction::DoneReading) => {
            transfer.source_done = true;
            transfer.token = None;
            Ok(PostAction::Remove)
        }
        Ok(OutgoingAction::Done) => {
            if let Some(mut transfer) = sel.outgoing.remove(&requestor) {
                transfer.token = None;
                transfer.destroy(handle);
            }
            Ok(PostAction::Remove)
        }
        Err(err) => {
            warn!(?err, requestor, "Selection transfer failed");
            if let Some(mut transfer) = sel.outgoing.remove(&requestor) {
                transfer.refuse_once(&conn);
                release_requestor(&conn, &transfer);
                transfer.token = None;
                transfer.destroy(handle);
            }
            Ok(PostAction::Remove)
        }
    }
}

/// The owner of a selection answered one of our `convert_selection` calls.
fn handle_selection_notify<D: XwmHandler + 'static>(
    state: &mut D,
    handle: &LoopHandle<'static, D>,
    id: XwmId,
    n: &SelectionNotifyEvent,
) -> Result<(), ReplyOrIdError> {
    let xwm = state.xwm_state(id);
    let conn = xwm.conn.clone();
    let atoms = xwm.atoms;

    // reply to a TARGETS probe after an ownership change
    if n.target == atoms.TARGETS {
        let Some(sel) = xwm
            .selections_mut()
            .into_iter()
            .find(|s| s.window == n.requestor)
        else {
            return Ok(());
        };
        let target = sel.target;
        let window = *sel.window;
        if n.property == x11rb::NONE {
            debug!(?target, "Selection owner advertised no targets");
            state.cleared_selection(id, target);
            return Ok(());
        }
        let reply = conn
            .get_property(true, window, atoms._WL_SELECTION, AtomEnum::ANY, 0, 4096)?
            .reply()?;
        let target_atoms: Vec<Atom> = reply.value32().map(|v| v.collect()).unwrap_or_default();
        let mut mime_types = Vec::new();
        for atom in target_atoms {
            if let Some(mime) = xwm.mime_from_atom(atom)? {
                if !mime_types.contains(&mime) {
                    mime_types.push(mime);
                }
            }
        }
        debug!(?target, ?mime_types, "New X11 selection offer");
        state.new_selection(id, target, mime_types);
        return Ok(());
    }

    // data reply for an in-flight conversion
    let Some(sel) = xwm
        .selections_mut()
        .into_iter()
        .find(|s| s.pending.contains_key(&n.requestor))
    else {
        trace!(requestor = n.requestor, "SelectionNotify for no transfer of ours");
        return Ok(());
    };
    let sel_atom = sel.atom;
    let target = sel.target;
    let Some(mut pending) = sel.pending.remove(&n.requestor) else {
        return Ok(());
    };
    if let Some(token) = pending.timeout.take() {
        handle.remove(token);
    }

    if n.property == x11rb::NONE {
        debug!(mime = %pending.mime, "Selection owner refused the conversion");
        // dropping the pipe tells the wayland side there is no data
        drop(pending);
        if target == SelectionTarget::Dnd {
            dnd::transfer_finished(state.xwm_state(id), false);
        }
        return Ok(());
    }

    let win = *pending.window;
    let probe = conn
        .get_property(false, win, atoms._WL_SELECTION, AtomEnum::ANY, 0, 0)?
        .reply()?;
    let mut transfer = IncomingTransfer {
        token: None,
        timeout: None,
        window: pending.window,
        incr: probe.type_ == atoms.INCR,
        incr_done: false,
        progress: 0,
        buffer: Vec::new(),
    };
    if transfer.incr {
        trace!(window = win, "Incoming transfer is incremental");
        // deleting the INCR property asks the owner for the first chunk
        conn.delete_property(win, atoms._WL_SELECTION)?;
        conn.flush()?;
    } else {
        transfer.buffer = fetch_property(&conn, win, atoms._WL_SELECTION, true)?;
        transfer.progress += 1;
    }

    let loop_handle = handle.clone();
    match handle.insert_source(
        Generic::new(pending.fd, Interest::WRITE, Mode::Level),
        move |_, fd, state: &mut D| incoming_ready(state, &loop_handle, id, sel_atom, win, fd.as_fd()),
    ) {
        Ok(token) => transfer.token = Some(token),
        Err(err) => {
            warn!(?err, "Failed to register the transfer descriptor");
            return Ok(());
        }
    }
    transfer.timeout = arm_transfer_timeout(handle, id, sel_atom, TransferDirection::Incoming, win);
    if transfer.incr {
        // nothing to write until the first chunk lands
        if let Some(token) = transfer.token.as_ref() {
            let _ = handle.disable(token);
        }
    }

    let xwm = state.xwm_state(id);
    if let Some(sel) = xwm.selection_by_atom_mut(sel_atom) {
        sel.incoming.insert(win, transfer);
    }
    Ok(())
}

fn incoming_ready<D: XwmHandler + 'static>(
    state: &mut D,
    handle: &LoopHandle<'static, D>,
    id: XwmId,
    sel_atom: Atom,
    window: X11Window,
    fd: BorrowedFd<'_>,
) -> std::io::Result<PostAction> {
    let xwm = state.xwm_state(id);
    let Some(sel) = xwm.selection_by_atom_mut(sel_atom) else {
        return Ok(PostAction::Remove);
    };
    let target = sel.target;
    let Some(transfer) = sel.incoming.get_mut(&window) else {
        return Ok(PostAction::Remove);
    };

    match transfer.write_out(fd) {
        Ok(true) => {
            if transfer.incr && !transfer.incr_done {
                // buffer drained, wait for the next chunk
                return Ok(PostAction::Disable);
            }
            if let Some(mut transfer) = sel.incoming.remove(&window) {
                transfer.token = None;
                transfer.destroy(handle);
            }
            debug!(window, "Incoming selection transfer complete");
            if target == SelectionTarget::Dnd {
                dnd::transfer_finished(xwm, true);
            }
            Ok(PostAction::Remove)
        }
        Ok(false) => Ok(PostAction::Continue),
        Err(err) => {
            warn!(?err, window, "Writing selection data failed");
            if let Some(mut transfer) = sel.incoming.remove(&window) {
                transfer.token = None;
                transfer.destroy(handle);
            }
            if target == SelectionTarget::Dnd {
                dnd::transfer_finished(xwm, false);
            }
            Ok(PostAction::Remove)
        }
    }
}

/// Property events that belong to a transfer rather than to a client window.
fn handle_property_notify<D: XwmHandler + 'static>(
    state: &mut D,
    handle: &LoopHandle<'static, D>,
    id: XwmId,
    n: &PropertyNotifyEvent,
) -> Result<bool, ReplyOrIdError> {
    let xwm = state.xwm_state(id);
    let conn = xwm.conn.clone();
    let atoms = xwm.atoms;

    // the requestor deleted the chunk property, send the next one
    if n.state == Property::DELETE {
        for sel in xwm.selections_mut() {
            let Some(transfer) = sel.outgoing.get_mut(&n.window) else {
                continue;
            };
            if transfer.request.property != n.atom {
                continue;
            }
            transfer.property_set = false;
            transfer.progress += 1;
            if transfer.cancelled {
                if let Some(mut transfer) = sel.outgoing.remove(&n.window) {
                    release_requestor(&conn, &transfer);
                    transfer.destroy(handle);
                }
                return Ok(true);
            }
            if !transfer.flush_property_on_delete {
                return Ok(true);
            }
            transfer.flush_property_on_delete = false;
            let remaining = transfer.flush_data(&conn)?;
            if transfer.sent_finished {
                debug!(requestor = n.window, "Incremental transfer finished");
                if let Some(mut transfer) = sel.outgoing.remove(&n.window) {
                    release_requestor(&conn, &transfer);
                    transfer.destroy(handle);
                }
            } else if transfer.source_done || remaining >= INCR_CHUNK_SIZE {
                transfer.flush_property_on_delete = true;
            }
            return Ok(true);
        }
    }

    // the owner wrote the next chunk of an incremental conversion
    if n.state == Property::NEW_VALUE && n.atom == atoms._WL_SELECTION {
        let mut matched = false;
        let mut completed_dnd = false;
        for sel in xwm.selections_mut() {
            let Some(transfer) = sel.incoming.get_mut(&n.window) else {
                continue;
            };
            matched = true;
            if !transfer.incr {
                // initial write before the SelectionNotify, read there
                break;
            }
            let chunk = fetch_property(&conn, n.window, atoms._WL_SELECTION, true)?;
            if chunk.is_empty() {
                transfer.incr_done = true;
                transfer.progress += 1;
            } else {
                transfer.accumulate(&chunk);
            }
            if transfer.incr_done && transfer.buffer.is_empty() {
                // everything already drained into the descriptor
                completed_dnd = sel.target == SelectionTarget::Dnd;
                if let Some(mut transfer) = sel.incoming.remove(&n.window) {
                    transfer.destroy(handle);
                }
                debug!(window = n.window, "Incremental conversion complete");
            } else if let Some(token) = transfer.token.as_ref() {
                let _ = handle.enable(token);
            }
            break;
        }
        if matched {
            if completed_dnd {
                dnd::transfer_finished(state.xwm_state(id), true);
            }
            return Ok(true);
        }
    }

    // swallow property traffic on selection-owned windows either way
    Ok(xwm.selections_mut().into_iter().any(|s| s.has_window(n.window)))
}

/// An X11 client (or nobody) took over a selection.
fn handle_xfixes_notify<D: XwmHandler + 'static>(
    state: &mut D,
    id: XwmId,
    n: &XfixesSelectionNotifyEvent,
) -> Result<(), ReplyOrIdError> {
    let xwm = state.xwm_state(id);
    let conn = xwm.conn.clone();
    let atoms = xwm.atoms;
    let Some(sel) = xwm.selection_by_atom_mut(n.selection) else {
        return Ok(());
    };
    let target = sel.target;

    if sel.window == n.owner {
        // our own claim confirmed, remember the acquisition time
        sel.owner = n.owner;
        sel.timestamp = n.selection_timestamp;
        return Ok(());
    }

    sel.owner = n.owner;
    sel.timestamp = n.timestamp;
    sel.claim_pending = false;
    // whatever wayland source was bound no longer backs the X11 selection
    sel.cancel_outgoing(&conn);
    sel.source_mimes = None;

    if n.owner == x11rb::NONE {
        debug!(?target, "Selection went ownerless");
        state.cleared_selection(id, target);
        return Ok(());
    }

    debug!(?target, owner = n.owner, "Foreign selection owner, fetching targets");
    let window = *sel.window;
    conn.convert_selection(window, n.selection, atoms.TARGETS, atoms._WL_SELECTION, n.timestamp)?;
    conn.flush()?;
    Ok(())
}

/// Stop watching a requestor window that an incremental transfer subscribed.
///
/// Managed windows keep their mask, it did not come from the transfer.
fn release_requestor(conn: &RustConnection, transfer: &OutgoingTransfer) {
    if transfer.incr && !transfer.requestor_tracked {
        let _ = conn.change_window_attributes(
            transfer.request.requestor,
            &ChangeWindowAttributesAux::new().event_mask(EventMask::NO_EVENT),
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransferDirection {
    Incoming,
    Outgoing,
}

/// Watchdog killing a transfer that stops making progress.
fn arm_transfer_timeout<D: XwmHandler + 'static>(
    handle: &LoopHandle<'static, D>,
    id: XwmId,
    sel_atom: Atom,
    direction: TransferDirection,
    key: X11Window,
) -> Option<RegistrationToken> {
    let loop_handle = handle.clone();
    let mut last_progress = 0usize;
    handle
        .insert_source(Timer::from_duration(TRANSFER_STEP_TIMEOUT), move |_, _, state: &mut D| {
            let xwm = state.xwm_state(id);
            let conn = xwm.conn.clone();
            let Some(sel) = xwm.selection_by_atom_mut(sel_atom) else {
                return TimeoutAction::Drop;
            };
            let target = sel.target;
            match direction {
                TransferDirection::Outgoing => {
                    let Some(transfer) = sel.outgoing.get_mut(&key) else {
                        return TimeoutAction::Drop;
                    };
                    if !transfer.cancelled && transfer.progress != last_progress {
                        last_progress = transfer.progress;
                        return TimeoutAction::ToDuration(TRANSFER_STEP_TIMEOUT);
                    }
                    warn!(requestor = key, "Outgoing selection transfer stalled, aborting");
                    if let Some(mut transfer) = sel.outgoing.remove(&key) {
                        transfer.timeout = None;
                        transfer.refuse_once(&conn);
                        release_requestor(&conn, &transfer);
                        transfer.destroy(&loop_handle);
                    }
                    TimeoutAction::Drop
                }
                TransferDirection::Incoming => {
                    let Some(transfer) = sel.incoming.get_mut(&key) else {
                        return TimeoutAction::Drop;
                    };
                    if transfer.progress != last_progress {
                        last_progress = transfer.progress;
                        return TimeoutAction::ToDuration(TRANSFER_STEP_TIMEOUT);
                    }
                    warn!(window = key, "Incoming selection transfer stalled, aborting");
                    if let Some(mut transfer) = sel.incoming.remove(&key) {
                        transfer.timeout = None;
                        transfer.destroy(&loop_handle);
                    }
                    if target == SelectionTarget::Dnd {
                        dnd::transfer_finished(xwm, false);
                    }
                    TimeoutAction::Drop
                }
            }
        })
        .ok()
}

/// Watchdog for a conversion whose owner never answers.
fn arm_pending_timeout<D: XwmHandler + 'static>(
    handle: &LoopHandle<'static, D>,
    id: XwmId,
    sel_atom: Atom,
    window: X11Window,
) -> Option<RegistrationToken> {
    handle
        .insert_source(Timer::from_duration(TRANSFER_STEP_TIMEOUT), move |_, _, state: &mut D| {
            let xwm = state.xwm_state(id);
            let Some(sel) = xwm.selection_by_atom_mut(sel_atom) else {
                return TimeoutAction::Drop;
            };
            let target = sel.target;
            if let Some(mut pending) = sel.pending.remove(&window) {
                pending.timeout = None;
                warn!(mime = %pending.mime, "Selection owner never answered, dropping conversion");
                drop(pending);
                if target == SelectionTarget::Dnd {
                    dnd::transfer_finished(xwm, false);
                }
            }
            TimeoutAction::Drop
        })
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xwm::test_atoms;

    fn drain(fd: BorrowedFd<'_>, into: &mut Vec<u8>) {
        let mut buf = [0u8; 4096];
        loop {
            match rustix::io::read(fd, &mut buf) {
                Ok(0) => break,
                Ok(len) => into.extend_from_slice(&buf[..len]),
                Err(err) if err == Errno::AGAIN => break,
                Err(err) => panic!("pipe read failed: {err}"),
            }
        }
    }

    fn incoming(incr: bool) -> IncomingTransfer {
        IncomingTransfer {
            token: None,
            timeout: None,
            window: OwnedX11Window::dangling(1),
            incr,
            incr_done: false,
            progress: 0,
            buffer: Vec::new(),
        }
    }

    #[test]
    fn chunks_split_at_the_property_limit() {
        let mut buffer = vec![7u8; INCR_CHUNK_SIZE + 10];
        let chunk = take_chunk(&mut buffer);
        assert_eq!(chunk.len(), INCR_CHUNK_SIZE);
        assert_eq!(buffer.len(), 10);

        let chunk = take_chunk(&mut buffer);
        assert_eq!(chunk.len(), 10);
        assert!(buffer.is_empty());

        // the terminal chunk of an incremental transfer
        assert!(take_chunk(&mut buffer).is_empty());
    }

    #[test]
    fn small_payload_round_trips_through_one_chunk() {
        let payload = b"clipboard contents".to_vec();
        let mut source = payload.clone();
        let chunk = take_chunk(&mut source);
        assert!(source.is_empty());

        let (read_fd, write_fd) = pipe_with(PipeFlags::CLOEXEC | PipeFlags::NONBLOCK).unwrap();
        let mut transfer = incoming(false);
        transfer.accumulate(&chunk);
        assert!(transfer.write_out(write_fd.as_fd()).unwrap());

        let mut received = Vec::new();
        drain(read_fd.as_fd(), &mut received);
        assert_eq!(received, payload);
    }

    #[test]
    fn incremental_payload_reassembles_and_completes_once() {
        let payload: Vec<u8> = (0..INCR_CHUNK_SIZE * 10 + 123).map(|i| (i % 251) as u8).collect();

        // chunk it the way the serving side does
        let mut source = payload.clone();
        let mut chunks = Vec::new();
        loop {
            let chunk = take_chunk(&mut source);
            let terminal = chunk.is_empty();
            chunks.push(chunk);
            if terminal {
                break;
            }
        }
        // ten full chunks, one partial, one terminal
        assert_eq!(chunks.len(), 12);

        let (read_fd, write_fd) = pipe_with(PipeFlags::CLOEXEC | PipeFlags::NONBLOCK).unwrap();
        let mut transfer = incoming(true);
        let mut received = Vec::new();
        let mut completions = 0;
        for chunk in chunks {
            if chunk.is_empty() {
                transfer.incr_done = true;
            } else {
                transfer.accumulate(&chunk);
            }
            loop {
                let done = transfer.write_out(write_fd.as_fd()).unwrap();
                drain(read_fd.as_fd(), &mut received);
                if done {
                    break;
                }
            }
            if transfer.incr_done && transfer.buffer.is_empty() {
                completions += 1;
            }
        }

        assert_eq!(completions, 1);
        assert_eq!(received, payload);
    }

    #[test]
    fn unsupported_targets_are_refused() {
        let atoms = test_atoms();
        let mimes = vec!["text/plain;charset=utf-8".to_string()];

        // target resolves to a mime type nobody offers
        assert_eq!(
            classify_request(&atoms, Some(&mimes), 9999, Some("image/png".into())),
            RequestAction::Refuse
        );
        // target does not resolve at all
        assert_eq!(
            classify_request(&atoms, Some(&mimes), 9999, None),
            RequestAction::Refuse
        );
        // no wayland source bound
        assert_eq!(
            classify_request(&atoms, None, atoms.TARGETS, None),
            RequestAction::Refuse
        );
    }

    #[test]
    fn request_classification_matches_the_offered_formats() {
        let atoms = test_atoms();
        let mimes = vec!["text/plain;charset=utf-8".to_string(), "image/png".to_string()];

        assert_eq!(
            classify_request(&atoms, Some(&mimes), atoms.TARGETS, None),
            RequestAction::SendTargets
        );
        assert_eq!(
            classify_request(&atoms, Some(&mimes), atoms.TIMESTAMP, None),
            RequestAction::SendTimestamp
        );
        assert_eq!(
            classify_request(&atoms, Some(&mimes), atoms.UTF8_STRING, Some("text/plain;charset=utf-8".into())),
            RequestAction::SendData("text/plain;charset=utf-8".into())
        );
    }

    fn test_request() -> SelectionRequestEvent {
        SelectionRequestEvent {
            response_type: 0,
            sequence: 0,
            time: 0,
            owner: 10,
            requestor: 11,
            selection: 12,
            target: 13,
            property: 14,
        }
    }

    #[test]
    fn cancelling_a_transfer_refuses_unanswered_requests_once() {
        let mut transfer = OutgoingTransfer::new(test_request(), false);
        assert!(transfer.mark_cancelled());
        // a second cancel is a no-op
        assert!(!transfer.mark_cancelled());
        assert!(!transfer.notified);

        // an incremental transfer already answered its request
        let mut transfer = OutgoingTransfer::new(test_request(), false);
        transfer.incr = true;
        transfer.notified = true;
        assert!(transfer.mark_cancelled());
        assert!(transfer.notified);
    }

    #[test]
    fn well_known_mime_mapping_is_stable() {
        let atoms = test_atoms();

        let atom = well_known_atom(&atoms, "text/plain;charset=utf-8").unwrap();
        assert_eq!(atom, atoms.UTF8_STRING);
        assert_eq!(well_known_mime(&atoms, atom), Some("text/plain;charset=utf-8"));

        let atom = well_known_atom(&atoms, "text/plain").unwrap();
        assert_eq!(atom, atoms.TEXT);
        assert_eq!(well_known_mime(&atoms, atom), Some("text/plain"));

        assert_eq!(well_known_atom(&atoms, "image/png"), None);
    }
}
