//! XDND bridging for drags originating from X11 clients.
//!
//! When a client claims the `XdndSelection`, a fullscreen `XdndAware` proxy
//! window is raised so the drag source addresses its protocol messages at us.
//! Enter/position/drop messages arriving there are translated into
//! [`XwmHandler`] callbacks carrying an [`X11DataOffer`]; the actual payload
//! moves through the shared selection machinery once the compositor pulls it
//! with [`X11Wm::send_selection`](super::X11Wm::send_selection). After the
//! post-drop transfer settles, the source receives `XdndFinished`.

use std::sync::Arc;

use tracing::{debug, trace, warn};
use x11rb::{
    connection::Connection as _,
    errors::ReplyOrIdError,
    protocol::{
        xproto::{
            Atom, AtomEnum, ClientMessageData, ClientMessageEvent, ConfigureWindowAux, ConnectionExt as _,
            CreateWindowAux, EventMask, PropMode, Screen, StackMode, Window as X11Window, WindowClass,
        },
        Event,
    },
    rust_connection::RustConnection,
    wrapper::ConnectionExt as _,
};

use super::{
    selection::{SelectionTarget, XwmSelection},
    Atoms, OwnedX11Window, X11Wm, XwmHandler, XwmId,
};

const DND_VERSION: u32 = 5;

/// The action a drag-and-drop operation requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DndAction {
    /// No action / the drag was not accepted
    None,
    /// Copy the data
    Copy,
    /// Move the data
    Move,
    /// Ask the user which action to take
    Ask,
}

impl DndAction {
    fn from_x(atom: Atom, atoms: &Atoms) -> DndAction {
        match atom {
            x if x == atoms.XdndActionCopy => DndAction::Copy,
            x if x == atoms.XdndActionMove => DndAction::Move,
            x if x == atoms.XdndActionAsk => DndAction::Ask,
            _ => DndAction::None,
        }
    }

    fn to_x(self, atoms: &Atoms) -> Atom {
        match self {
            DndAction::Copy => atoms.XdndActionCopy,
            DndAction::Move => atoms.XdndActionMove,
            DndAction::Ask => atoms.XdndActionAsk,
            DndAction::None => AtomEnum::NONE.into(),
        }
    }
}

/// Data offered by an X11 drag source.
///
/// Pull the payload for one of the offered MIME types with
/// [`X11Wm::send_selection`](super::X11Wm::send_selection) using
/// [`SelectionTarget::Dnd`].
#[derive(Debug, Clone)]
pub struct X11DataOffer {
    pub(super) source_window: X11Window,
    pub(super) mime_types: Vec<String>,
    pub(super) action: DndAction,
}

impl X11DataOffer {
    /// The window of the X11 client the drag originates from
    pub fn source_window(&self) -> X11Window {
        self.source_window
    }

    /// MIME types the drag source offers
    pub fn mime_types(&self) -> &[String] {
        &self.mime_types
    }

    /// The action the source most recently requested
    pub fn action(&self) -> DndAction {
        self.action
    }
}

/// Read access to the XDND state of an [`X11Wm`](super::X11Wm).
#[derive(Debug)]
pub struct X11DataDevice<'a> {
    dnd: &'a XwmDnd,
}

impl X11DataDevice<'_> {
    /// The offer of the drag currently hovering the compositor, if any
    pub fn active_offer(&self) -> Option<&X11DataOffer> {
        self.dnd.offer.as_ref().map(|active| &active.offer)
    }

    /// Whether the active drag was already dropped and awaits its data pull
    pub fn is_dropped(&self) -> bool {
        self.dnd.offer.as_ref().is_some_and(|active| active.dropped)
    }
}

impl X11Wm {
    /// Access the state of drags originating from X11 clients.
    pub fn dnd_device(&self) -> X11DataDevice<'_> {
        X11DataDevice { dnd: &self.dnd }
    }
}

#[derive(Debug)]
struct ActiveOffer {
    offer: X11DataOffer,
    version: u32,
    /// `dnd_entered` was delivered (requires the first position message)
    announced: bool,
    dropped: bool,
}

#[derive(Debug)]
pub(super) struct XwmDnd {
    pub(super) selection: XwmSelection,
    // fullscreen XdndAware window raised while a foreign drag is active
    proxy: Option<OwnedX11Window>,
    offer: Option<ActiveOffer>,
}

impl XwmDnd {
    pub(super) fn new(
        conn: &Arc<RustConnection>,
        screen: &Screen,
        atoms: &Atoms,
    ) -> Result<Self, ReplyOrIdError> {
        let selection = XwmSelection::new(conn, screen, atoms.XdndSelection, SelectionTarget::Dnd)?;

        conn.change_property32(
            PropMode::REPLACE,
            *selection.window,
            atoms.XdndAware,
            AtomEnum::ATOM,
            &[DND_VERSION],
        )?;
        conn.flush()?;

        Ok(XwmDnd {
            selection,
            proxy: None,
            offer: None,
        })
    }

    pub(super) fn has_window(&self, window: X11Window) -> bool {
        self.selection.has_window(window) || self.proxy.as_ref().is_some_and(|proxy| **proxy == window)
    }

    /// The drag source (or another involved window) was destroyed.
    pub(super) fn window_destroyed(&mut self, window: X11Window) {
        if self
            .offer
            .as_ref()
            .is_some_and(|active| active.offer.source_window == window)
        {
            debug!(window, "Drag source disappeared, dropping offer");
            self.offer = None;
            self.proxy = None;
        }
    }
}

/// XDND protocol traffic, handled before generic window dispatch.
///
/// Returns `true` when the event was consumed.
pub(super) fn handle_dnd_event<D: XwmHandler + 'static>(
    state: &mut D,
    id: XwmId,
    event: &Event,
) -> Result<bool, ReplyOrIdError> {
    match event {
        Event::XfixesSelectionNotify(n) => {
            if n.selection != state.xwm_state(id).atoms.XdndSelection {
                return Ok(false);
            }
            handle_owner_change(state, id, n.owner, n.timestamp)?;
            Ok(true)
        }
        Event::ClientMessage(msg) => {
            let atoms = state.xwm_state(id).atoms;
            match msg.type_ {
                x if x == atoms.XdndEnter => {
                    handle_enter(state, id, msg.data)?;
                    Ok(true)
                }
                x if x == atoms.XdndPosition => {
                    handle_position(state, id, msg.data)?;
                    Ok(true)
                }
                x if x == atoms.XdndLeave => {
                    handle_leave(state, id, msg.data);
                    Ok(true)
                }
                x if x == atoms.XdndDrop => {
                    handle_drop(state, id, msg.data);
                    Ok(true)
                }
                x if x == atoms.XdndStatus || x == atoms.XdndFinished => {
                    // sent by drop targets; only relevant when the compositor
                    // side drags, which reaches X clients as a plain selection
                    trace!(window = msg.window, "Ignoring XDND target message");
                    Ok(true)
                }
                _ => Ok(false),
            }
        }
        _ => Ok(false),
    }
}

fn handle_owner_change<D: XwmHandler + 'static>(
    state: &mut D,
    id: XwmId,
    owner: X11Window,
    timestamp: u32,
) -> Result<(), ReplyOrIdError> {
    let xwm = state.xwm_state(id);
    let conn = xwm.conn.clone();
    let atoms = xwm.atoms;

    xwm.dnd.selection.owner = owner;
    xwm.dnd.selection.timestamp = timestamp;

    if xwm.dnd.selection.window == owner {
        // the compositor side started a drag through new_selection()
        return Ok(());
    }

    // a foreign owner invalidates whatever source the compositor had bound
    xwm.dnd.selection.cancel_outgoing(&conn);
    xwm.dnd.selection.source_mimes = None;
    xwm.dnd.selection.claim_pending = false;

    if owner == x11rb::NONE {
        trace!("XDND selection went away");
        xwm.dnd.proxy = None;
        let was_announced = xwm
            .dnd
            .offer
            .take()
            .is_some_and(|active| active.announced && !active.dropped);
        if was_announced {
            state.dnd_left(id);
        }
        return Ok(());
    }

    trace!(owner, "X11 client started a drag");
    if xwm.dnd.proxy.is_none() {
        // a fullscreen XdndAware window makes the drag source talk to us
        // wherever the pointer goes
        let screen = xwm.screen.clone();
        let win = conn.generate_id()?;
        conn.create_window(
            screen.root_depth,
            win,
            screen.root,
            0,
            0,
            screen.width_in_pixels,
            screen.height_in_pixels,
            0,
            WindowClass::INPUT_OUTPUT,
            screen.root_visual,
            &CreateWindowAux::new().event_mask(EventMask::PROPERTY_CHANGE),
        )?;
        conn.change_property32(PropMode::REPLACE, win, atoms.XdndAware, AtomEnum::ATOM, &[DND_VERSION])?;
        conn.change_property8(
            PropMode::REPLACE,
            win,
            atoms._NET_WM_NAME,
            atoms.UTF8_STRING,
            "xwayland-wm XDND proxy".as_bytes(),
        )?;
        conn.map_window(win)?;
        conn.configure_window(win, &ConfigureWindowAux::new().stack_mode(StackMode::ABOVE))?;
        conn.flush()?;
        xwm.dnd.proxy = Some(OwnedX11Window::new(win, &conn));
    }
    Ok(())
}

fn handle_enter<D: XwmHandler + 'static>(
    state: &mut D,
    id: XwmId,
    data: ClientMessageData,
) -> Result<(), ReplyOrIdError> {
    let xwm = state.xwm_state(id);
    let conn = xwm.conn.clone();
    let atoms = xwm.atoms;
    let data = data.as_data32();
    let source = data[0];
    let version = data[1] >> 24;
    trace!(source, version, "Got XDND enter");
    if version > DND_VERSION {
        warn!(version, "Ignoring drag with unsupported XDND version");
        return Ok(());
    }

    let type_atoms: Vec<Atom> = if data[1] & 1 == 0 {
        data[2..5].iter().copied().filter(|atom| *atom != x11rb::NONE).collect()
    } else {
        // more than three formats, listed in a property on the source
        match conn
            .get_property(false, source, atoms.XdndTypeList, AtomEnum::ANY, 0, 4096)?
            .reply_unchecked()
        {
            Ok(Some(reply)) => reply.value32().map(|values| values.collect()).unwrap_or_default(),
            _ => Vec::new(),
        }
    };
    let mut mime_types = Vec::new();
    for atom in type_atoms {
        if let Some(mime) = xwm.mime_from_atom(atom)? {
            if !mime_types.contains(&mime) {
                mime_types.push(mime);
            }
        }
    }

    xwm.dnd.offer = Some(ActiveOffer {
        offer: X11DataOffer {
            source_window: source,
            mime_types,
            action: DndAction::Copy,
        },
        version,
        announced: false,
        dropped: false,
    });
    Ok(())
}

fn handle_position<D: XwmHandler + 'static>(
    state: &mut D,
    id: XwmId,
    data: ClientMessageData,
) -> Result<(), ReplyOrIdError> {
    let xwm = state.xwm_state(id);
    let conn = xwm.conn.clone();
    let atoms = xwm.atoms;
    let data = data.as_data32();
    let source = data[0];

    let Some(active) = xwm.dnd.offer.as_mut() else {
        trace!(source, "XDND position without an active drag");
        return Ok(());
    };
    if active.offer.source_window != source {
        debug!(
            source,
            expected = active.offer.source_window,
            "XDND position from unexpected source"
        );
        return Ok(());
    }

    let (x, y) = unpack_coords(data[2]);
    if active.version > 1 {
        xwm.dnd.selection.timestamp = data[3];
    }
    let requested = DndAction::from_x(data[4], &atoms);
    active.offer.action = if requested == DndAction::None {
        DndAction::Copy
    } else {
        requested
    };

    // accept and keep the position updates coming; the compositor decides
    // what to do with the payload when it pulls it
    let status = [
        *xwm.dnd.selection.window,
        3,
        0,
        0,
        active.offer.action.to_x(&atoms),
    ];
    conn.send_event(
        false,
        source,
        EventMask::NO_EVENT,
        ClientMessageEvent::new(32, source, atoms.XdndStatus, status),
    )?;
    conn.flush()?;

    let announce = !active.announced;
    active.announced = true;
    let offer = active.offer.clone();
    if announce {
        state.dnd_entered(id, offer, x, y);
    } else {
        state.dnd_motion(id, x, y);
    }
    Ok(())
}

fn handle_leave<D: XwmHandler + 'static>(state: &mut D, id: XwmId, data: ClientMessageData) {
    let xwm = state.xwm_state(id);
    let data = data.as_data32();
    let source = data[0];
    trace!(source, "Got XDND leave");

    let matches = xwm
        .dnd
        .offer
        .as_ref()
        .is_some_and(|active| active.offer.source_window == source);
    if !matches {
        return;
    }
    let was_announced = xwm
        .dnd
        .offer
        .take()
        .is_some_and(|active| active.announced && !active.dropped);
    if was_announced {
        state.dnd_left(id);
    }
}

fn handle_drop<D: XwmHandler + 'static>(state: &mut D, id: XwmId, data: ClientMessageData) {
    let xwm = state.xwm_state(id);
    let data = data.as_data32();
    let source = data[0];
    trace!(source, "Got XDND drop");

    let Some(active) = xwm.dnd.offer.as_mut() else {
        return;
    };
    if active.offer.source_window != source {
        debug!(source, "XDND drop from unexpected source");
        return;
    }
    if !active.announced {
        // drop without a single position message, nothing to hand over
        active.dropped = true;
        transfer_finished(xwm, false);
        return;
    }
    active.dropped = true;
    if data[2] != 0 {
        xwm.dnd.selection.timestamp = data[2];
    }
    state.dnd_dropped(id);
}

/// The post-drop data pull settled (or failed); tell the source and clean up.
pub(super) fn transfer_finished(xwm: &mut X11Wm, success: bool) {
    let Some(active) = xwm.dnd.offer.as_ref() else {
        return;
    };
    if !active.dropped {
        return;
    }
    let source = active.offer.source_window;
    let action = if success { active.offer.action } else { DndAction::None };
    let data = [
        *xwm.dnd.selection.window,
        success as u32,
        action.to_x(&xwm.atoms),
        0,
        0,
    ];
    trace!(source, success, "Sending XdndFinished");
    if let Err(err) = xwm.conn.send_event(
        false,
        source,
        EventMask::NO_EVENT,
        ClientMessageEvent::new(32, source, xwm.atoms.XdndFinished, data),
    ) {
        warn!(?err, "Failed to send XdndFinished");
    }
    let _ = xwm.conn.flush();
    xwm.dnd.offer = None;
    xwm.dnd.proxy = None;
}

/// XDND packs root coordinates as `x << 16 | y`.
fn unpack_coords(packed: u32) -> (i32, i32) {
    (((packed >> 16) as i16) as i32, ((packed & 0xffff) as i16) as i32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xwm::test_atoms;

    #[test]
    fn actions_round_trip_through_their_atoms() {
        let atoms = test_atoms();
        for action in [DndAction::Copy, DndAction::Move, DndAction::Ask] {
            assert_eq!(DndAction::from_x(action.to_x(&atoms), &atoms), action);
        }
        // None maps to the NONE atom, and unknown atoms back to None
        assert_eq!(DndAction::None.to_x(&atoms), u32::from(AtomEnum::NONE));
        assert_eq!(DndAction::from_x(98765, &atoms), DndAction::None);
    }

    #[test]
    fn position_coordinates_unpack() {
        assert_eq!(unpack_coords((100 << 16) | 200), (100, 200));
        assert_eq!(unpack_coords(0), (0, 0));
        // coordinates are signed 16-bit values
        assert_eq!(unpack_coords(0xffff_ffff), (-1, -1));
    }

    #[test]
    fn offers_expose_the_source_formats() {
        let offer = X11DataOffer {
            source_window: 42,
            mime_types: vec!["text/uri-list".to_string()],
            action: DndAction::Copy,
        };
        assert_eq!(offer.source_window(), 42);
        assert_eq!(offer.mime_types(), ["text/uri-list".to_string()]);
        assert_eq!(offer.action(), DndAction::Copy);
    }
}
