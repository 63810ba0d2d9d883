use std::{
    collections::HashSet,
    sync::{Arc, Mutex, Weak},
};

use encoding_rs::WINDOWS_1252;

use x11rb::{
    connection::Connection as _,
    properties::{WmClass, WmHints, WmSizeHints},
    protocol::{
        res::{query_client_ids, ClientIdMask, ClientIdSpec},
        xproto::{
            Atom, AtomEnum, ClientMessageEvent, ConfigureWindowAux, ConnectionExt as _, EventMask,
            GetPropertyReply, PropMode, Window as X11Window,
        },
    },
    rust_connection::{ConnectionError, RustConnection},
    wrapper::ConnectionExt as _,
};

use super::{send_configure_notify, Atoms, XwmId};
use crate::utils::{Rectangle, Size};

/// An X11 window managed by an [`X11Wm`](super::X11Wm).
///
/// Handles are cheap to clone; all of them refer to the same underlying
/// window record, which stays readable after the window was destroyed
/// (check [`X11Surface::alive`]).
#[derive(Debug, Clone)]
pub struct X11Surface {
    xwm: XwmId,
    window: X11Window,
    conn: Weak<RustConnection>,
    atoms: Atoms,
    pub(super) state: Arc<Mutex<WindowState>>,
}

const MWM_HINTS_FLAGS_FIELD: usize = 0;
const MWM_HINTS_DECORATIONS_FIELD: usize = 2;
const MWM_HINTS_DECORATIONS: u32 = 1 << 1;

#[derive(Debug)]
pub(super) struct WindowState {
    pub(super) alive: bool,
    pub(super) mapped: bool,
    pub(super) geometry: Rectangle,
    pub(super) override_redirect: bool,

    // id of the wayland surface this window renders to, once announced
    pub(super) wl_surface_id: Option<u32>,

    title: String,
    class: String,
    instance: String,
    startup_id: Option<String>,
    pid: Option<u32>,
    protocols: Vec<WmProtocol>,
    hints: Option<WmHints>,
    normal_hints: Option<WmSizeHints>,
    transient_for: Option<X11Window>,
    net_state: HashSet<Atom>,
    motif_hints: Vec<u32>,
    window_type: Vec<Atom>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(super) enum WmProtocol {
    TakeFocus,
    DeleteWindow,
}

/// ICCCM input focus models.
///
/// <https://x.org/releases/X11R7.6/doc/xorg-docs/specs/ICCCM/icccm.html#input_focus>
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum InputMode {
    None,
    Passive,
    LocallyActive,
    GloballyActive,
}

impl PartialEq for X11Surface {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.xwm == other.xwm
            && self.window == other.window
            && self.with_state(|s| s.alive)
            && other.with_state(|s| s.alive)
    }
}

/// Errors that can happen for operations on an [`X11Surface`]
#[derive(Debug, thiserror::Error)]
pub enum X11SurfaceError {
    /// Error on the underlying X11 Connection
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    /// Operation was unsupported for an override_redirect window
    #[error("Operation was unsupported for an override_redirect window")]
    UnsupportedForOverrideRedirect,
}

/// Window types of [`X11Surface`]s
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum WmWindowType {
    DropdownMenu,
    Dialog,
    Menu,
    Notification,
    Normal,
    PopupMenu,
    Splash,
    Toolbar,
    Tooltip,
    Utility,
}

/// Window properties of [`X11Surface`]s
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum WmWindowProperty {
    Title,
    Class,
    Protocols,
    Hints,
    NormalHints,
    TransientFor,
    WindowType,
    MotifHints,
    StartupId,
    Pid,
}

impl WmWindowProperty {
    const ALL: [WmWindowProperty; 10] = [
        WmWindowProperty::Title,
        WmWindowProperty::Class,
        WmWindowProperty::Protocols,
        WmWindowProperty::Hints,
        WmWindowProperty::NormalHints,
        WmWindowProperty::TransientFor,
        WmWindowProperty::WindowType,
        WmWindowProperty::MotifHints,
        WmWindowProperty::StartupId,
        WmWindowProperty::Pid,
    ];
}

impl X11Surface {
    pub(super) fn new(
        xwm: XwmId,
        window: X11Window,
        override_redirect: bool,
        conn: Weak<RustConnection>,
        atoms: Atoms,
        geometry: Rectangle,
    ) -> X11Surface {
        X11Surface {
            xwm,
            window,
            conn,
            atoms,
            state: Arc::new(Mutex::new(WindowState {
                alive: true,
                mapped: false,
                geometry,
                override_redirect,
                wl_surface_id: None,
                title: String::new(),
                class: String::new(),
                instance: String::new(),
                startup_id: None,
                pid: None,
                protocols: Vec::new(),
                hints: None,
                normal_hints: None,
                transient_for: None,
                net_state: HashSet::new(),
                motif_hints: vec![0; 5],
                window_type: Vec::new(),
            })),
        }
    }

    fn with_state<T>(&self, f: impl FnOnce(&WindowState) -> T) -> T {
        f(&self.state.lock().unwrap())
    }

    /// Id of the [`X11Wm`](super::X11Wm) this surface belongs to
    pub fn xwm_id(&self) -> XwmId {
        self.xwm
    }

    /// X11 protocol id of the underlying window
    pub fn window_id(&self) -> X11Window {
        self.window
    }

    /// Returns if this window has the override redirect flag set or not
    pub fn is_override_redirect(&self) -> bool {
        self.with_state(|s| s.override_redirect)
    }

    /// Returns if the window is currently mapped or not
    pub fn is_mapped(&self) -> bool {
        self.with_state(|s| s.mapped)
    }

    /// Returns if the window is still alive
    #[inline]
    pub fn alive(&self) -> bool {
        self.with_state(|s| s.alive) && self.conn.strong_count() != 0
    }

    /// Id of the wayland surface this window renders to, once the client
    /// announced it.
    pub fn wl_surface_id(&self) -> Option<u32> {
        self.with_state(|s| s.wl_surface_id)
    }

    /// Set the X11 window as mapped/unmapped affecting its visibility.
    ///
    /// It is an error to call this function on override redirect windows
    pub fn set_mapped(&self, mapped: bool) -> Result<(), X11SurfaceError> {
        if self.is_override_redirect() {
            return Err(X11SurfaceError::UnsupportedForOverrideRedirect);
        }
        let Some(conn) = self.conn.upgrade() else {
            return Ok(());
        };

        // ICCCM 4.1.3.1, WM_STATE: 1 = NormalState, 3 = IconicState
        let wm_state = if mapped { 1u32 } else { 3u32 };
        conn.change_property32(
            PropMode::REPLACE,
            self.window,
            self.atoms.WM_STATE,
            self.atoms.WM_STATE,
            &[wm_state, x11rb::NONE],
        )?;
        if mapped {
            conn.map_window(self.window)?;
        } else {
            conn.unmap_window(self.window)?;
        }
        conn.flush()?;
        Ok(())
    }

    /// Send a configure to this window.
    ///
    /// If `rect` is provided the new state will be sent to the window.
    /// If `rect` is `None` a synthetic configure event with the existing state will be sent.
    /// Either way the client is acked, clients block on this after a configure request.
    pub fn configure(&self, rect: impl Into<Option<Rectangle>>) -> Result<(), X11SurfaceError> {
        let rect = rect.into();
        if self.is_override_redirect() && rect.is_some() {
            return Err(X11SurfaceError::UnsupportedForOverrideRedirect);
        }

        if let Some(conn) = self.conn.upgrade() {
            let mut state = self.state.lock().unwrap();
            let rect = rect.unwrap_or(state.geometry);
            let aux = ConfigureWindowAux::default()
                .x(rect.loc.x)
                .y(rect.loc.y)
                .width(rect.size.w as u32)
                .height(rect.size.h as u32)
                .border_width(0);
            conn.configure_window(self.window, &aux)?;
            send_configure_notify(&conn, self.window, rect, state.override_redirect)?;
            conn.flush()?;
            state.geometry = rect;
        }
        Ok(())
    }

    /// Returns the current geometry of the underlying X11 window
    pub fn geometry(&self) -> Rectangle {
        self.with_state(|s| s.geometry)
    }

    /// Returns the current title of the underlying X11 window
    pub fn title(&self) -> String {
        self.with_state(|s| s.title.clone())
    }

    /// Returns the current window class of the underlying X11 window
    pub fn class(&self) -> String {
        self.with_state(|s| s.class.clone())
    }

    /// Returns the current window instance of the underlying X11 window
    pub fn instance(&self) -> String {
        self.with_state(|s| s.instance.clone())
    }

    /// Returns the startup id of the underlying X11 window
    pub fn startup_id(&self) -> Option<String> {
        self.with_state(|s| s.startup_id.clone())
    }

    /// Returns the PID the underlying X11 window advertised via `_NET_WM_PID`
    pub fn pid(&self) -> Option<u32> {
        self.with_state(|s| s.pid)
    }

    /// Returns if the underlying window is transient to another window.
    ///
    /// This might be used as a hint to manage windows in a group.
    pub fn is_transient_for(&self) -> Option<X11Window> {
        self.with_state(|s| s.transient_for)
    }

    /// Returns the size hints for the underlying X11 window
    pub fn size_hints(&self) -> Option<WmSizeHints> {
        self.with_state(|s| s.normal_hints)
    }

    /// Returns the suggested minimum size of the underlying X11 window
    pub fn min_size(&self) -> Option<Size> {
        self.with_state(|s| s.normal_hints.as_ref().and_then(|hints| hints.min_size))
            .map(|(w, h)| Size::new(w, h))
    }

    /// Returns the suggested maximum size of the underlying X11 window
    pub fn max_size(&self) -> Option<Size> {
        self.with_state(|s| s.normal_hints.as_ref().and_then(|hints| hints.max_size))
            .map(|(w, h)| Size::new(w, h))
    }

    /// Returns the suggested base size of the underlying X11 window
    pub fn base_size(&self) -> Option<Size> {
        self.with_state(|s| {
            s.normal_hints
                .as_ref()
                .and_then(|hints| hints.base_size.or(hints.min_size))
        })
        .map(|(w, h)| Size::new(w, h))
    }

    fn has_net_state(&self, atom: Atom) -> bool {
        self.with_state(|s| s.net_state.contains(&atom))
    }

    /// Returns if the window is considered to be a popup.
    ///
    /// Corresponds to the `_NET_WM_STATE_MODAL` state of the underlying X11 window.
    pub fn is_popup(&self) -> bool {
        self.has_net_state(self.atoms._NET_WM_STATE_MODAL)
    }

    /// Returns if the window is in the maximized state
    pub fn is_maximized(&self) -> bool {
        self.has_net_state(self.atoms._NET_WM_STATE_MAXIMIZED_HORZ)
            && self.has_net_state(self.atoms._NET_WM_STATE_MAXIMIZED_VERT)
    }

    /// Returns if the window is in the fullscreen state
    pub fn is_fullscreen(&self) -> bool {
        self.has_net_state(self.atoms._NET_WM_STATE_FULLSCREEN)
    }

    /// Returns if the window is in the minimized state
    pub fn is_minimized(&self) -> bool {
        self.has_net_state(self.atoms._NET_WM_STATE_HIDDEN)
    }

    /// Returns if the window is in the activated state
    pub fn is_activated(&self) -> bool {
        self.has_net_state(self.atoms._NET_WM_STATE_FOCUSED)
    }

    /// Returns true if the window is client-side decorated
    pub fn is_decorated(&self) -> bool {
        self.with_state(|s| decorations_disabled_by_motif(&s.motif_hints))
    }

    /// Sets the window as maximized or not.
    ///
    /// Allows the client to reflect this state in their UI.
    pub fn set_maximized(&self, maximized: bool) -> Result<(), ConnectionError> {
        self.write_net_state(
            maximized,
            &[
                self.atoms._NET_WM_STATE_MAXIMIZED_HORZ,
                self.atoms._NET_WM_STATE_MAXIMIZED_VERT,
            ],
        )
    }

    /// Sets the window as fullscreen or not.
    ///
    /// Allows the client to reflect this state in their UI.
    pub fn set_fullscreen(&self, fullscreen: bool) -> Result<(), ConnectionError> {
        self.write_net_state(fullscreen, &[self.atoms._NET_WM_STATE_FULLSCREEN])
    }

    /// Sets the window as suspended/hidden or not.
    ///
    /// Allows the client to e.g. stop rendering.
    pub fn set_suspended(&self, suspended: bool) -> Result<(), ConnectionError> {
        self.write_net_state(suspended, &[self.atoms._NET_WM_STATE_HIDDEN])
    }

    /// Sets the window as activated or not.
    ///
    /// Allows the client to reflect this state in their UI.
    pub fn set_activated(&self, activated: bool) -> Result<(), ConnectionError> {
        self.write_net_state(activated, &[self.atoms._NET_WM_STATE_FOCUSED])
    }

    /// Add or remove `_NET_WM_STATE` atoms and republish the property.
    fn write_net_state(&self, set: bool, atoms: &[Atom]) -> Result<(), ConnectionError> {
        let mut state = self.state.lock().unwrap();
        let mut changed = false;
        for atom in atoms {
            changed |= if set {
                state.net_state.insert(*atom)
            } else {
                state.net_state.remove(atom)
            };
        }
        if !changed {
            return Ok(());
        }
        let serialized = Vec::from_iter(state.net_state.iter().copied());
        drop(state);

        let conn = self.conn.upgrade().ok_or(ConnectionError::UnknownError)?;
        conn.change_property32(
            PropMode::REPLACE,
            self.window,
            self.atoms._NET_WM_STATE,
            AtomEnum::ATOM,
            &serialized,
        )?;
        conn.flush()
    }

    /// Returns the reported window type of the underlying X11 window if set.
    ///
    /// Windows without a window type set should be considered to be of type
    /// `Normal` for backwards compatibility.
    pub fn window_type(&self) -> Option<WmWindowType> {
        self.with_state(|s| s.window_type.iter().find_map(|atom| self.known_window_type(*atom)))
    }

    fn known_window_type(&self, atom: Atom) -> Option<WmWindowType> {
        let atoms = &self.atoms;
        let type_ = match atom {
            a if a == atoms._NET_WM_WINDOW_TYPE_DROPDOWN_MENU => WmWindowType::DropdownMenu,
            a if a == atoms._NET_WM_WINDOW_TYPE_DIALOG => WmWindowType::Dialog,
            a if a == atoms._NET_WM_WINDOW_TYPE_MENU => WmWindowType::Menu,
            a if a == atoms._NET_WM_WINDOW_TYPE_NOTIFICATION => WmWindowType::Notification,
            a if a == atoms._NET_WM_WINDOW_TYPE_NORMAL => WmWindowType::Normal,
            a if a == atoms._NET_WM_WINDOW_TYPE_POPUP_MENU => WmWindowType::PopupMenu,
            a if a == atoms._NET_WM_WINDOW_TYPE_SPLASH => WmWindowType::Splash,
            a if a == atoms._NET_WM_WINDOW_TYPE_TOOLBAR => WmWindowType::Toolbar,
            a if a == atoms._NET_WM_WINDOW_TYPE_TOOLTIP => WmWindowType::Tooltip,
            a if a == atoms._NET_WM_WINDOW_TYPE_UTILITY => WmWindowType::Utility,
            _ => return None,
        };
        Some(type_)
    }

    /// Send a close request to this window.
    ///
    /// Will outright destroy windows that don't support the `WM_DELETE_WINDOW` protocol.
    pub fn close(&self) -> Result<(), ConnectionError> {
        let conn = self.conn.upgrade().ok_or(ConnectionError::UnknownError)?;
        if self.with_state(|s| s.protocols.contains(&WmProtocol::DeleteWindow)) {
            let event = ClientMessageEvent::new(
                32,
                self.window,
                self.atoms.WM_PROTOCOLS,
                [self.atoms.WM_DELETE_WINDOW, 0, 0, 0, 0],
            );
            conn.send_event(false, self.window, EventMask::NO_EVENT, event)?;
        } else {
            conn.destroy_window(self.window)?;
        }
        conn.flush()
    }

    /// Query the PID of the client owning this window through X-Resource.
    ///
    /// More reliable than [`X11Surface::pid`], which any client can forge.
    /// Returns `None` when the server lacks the extension or knows no local
    /// client for the window.
    pub fn client_pid(&self) -> Option<u32> {
        let conn = self.conn.upgrade()?;
        let spec = ClientIdSpec {
            client: self.window,
            mask: ClientIdMask::LOCAL_CLIENT_PID,
        };
        let reply = query_client_ids(&*conn, &[spec]).ok()?.reply().ok()?;
        reply.ids.first().and_then(|id| id.value.first().copied())
    }

    fn input_mode(&self) -> InputMode {
        let (input, take_focus) = self.with_state(|s| {
            (
                s.hints.as_ref().and_then(|hints| hints.input).unwrap_or(true),
                s.protocols.contains(&WmProtocol::TakeFocus),
            )
        });
        match (input, take_focus) {
            (false, false) => InputMode::None,
            (true, false) => InputMode::Passive, // the default
            (true, true) => InputMode::LocallyActive,
            (false, true) => InputMode::GloballyActive,
        }
    }

    /// How a focus transition has to be communicated to this window:
    /// `(set_input_focus, send_take_focus)`.
    pub(super) fn focus_protocol(&self) -> (bool, bool) {
        match self.input_mode() {
            InputMode::None => (false, false),
            InputMode::Passive => (true, false),
            InputMode::LocallyActive => (true, true),
            InputMode::GloballyActive => (false, true),
        }
    }

    pub(super) fn update_properties(&self) -> Result<(), ConnectionError> {
        // _NET_WM_STATE is managed by the WM and never re-read
        for property in WmWindowProperty::ALL {
            self.refresh(property)?;
        }
        Ok(())
    }

    pub(super) fn update_property(&self, atom: Atom) -> Result<Option<WmWindowProperty>, ConnectionError> {
        let Some(property) = self.property_for_atom(atom) else {
            return Ok(None);
        };
        self.refresh(property)?;
        Ok(Some(property))
    }

    fn property_for_atom(&self, atom: Atom) -> Option<WmWindowProperty> {
        let property = match atom {
            a if a == self.atoms._NET_WM_NAME || a == u32::from(AtomEnum::WM_NAME) => WmWindowProperty::Title,
            a if a == u32::from(AtomEnum::WM_CLASS) => WmWindowProperty::Class,
            a if a == self.atoms.WM_PROTOCOLS => WmWindowProperty::Protocols,
            a if a == self.atoms.WM_HINTS => WmWindowProperty::Hints,
            a if a == u32::from(AtomEnum::WM_NORMAL_HINTS) => WmWindowProperty::NormalHints,
            a if a == u32::from(AtomEnum::WM_TRANSIENT_FOR) => WmWindowProperty::TransientFor,
            a if a == self.atoms._NET_WM_WINDOW_TYPE => WmWindowProperty::WindowType,
            a if a == self.atoms._MOTIF_WM_HINTS => WmWindowProperty::MotifHints,
            a if a == self.atoms._NET_STARTUP_ID => WmWindowProperty::StartupId,
            a if a == self.atoms._NET_WM_PID => WmWindowProperty::Pid,
            _ => return None,
        };
        Some(property)
    }

    /// Re-read one cached property from the server.
    fn refresh(&self, property: WmWindowProperty) -> Result<(), ConnectionError> {
        let Some(conn) = self.conn.upgrade() else {
            return Err(ConnectionError::UnknownError);
        };
        match property {
            WmWindowProperty::Title => {
                let title = self
                    .read_string_property(&conn, self.atoms._NET_WM_NAME)?
                    .or(self.read_string_property(&conn, AtomEnum::WM_NAME)?)
                    .unwrap_or_default();
                self.state.lock().unwrap().title = title;
            }
            WmWindowProperty::Class => {
                let (class, instance) = match WmClass::get(&*conn, self.window)?.reply_unchecked() {
                    Ok(Some(reply)) => (
                        WINDOWS_1252.decode(reply.class()).0.into_owned(),
                        WINDOWS_1252.decode(reply.instance()).0.into_owned(),
                    ),
                    // racing against the window going away
                    Ok(None) | Err(ConnectionError::ParseError(_)) => Default::default(),
                    Err(err) => return Err(err),
                };
                let mut state = self.state.lock().unwrap();
                state.class = class;
                state.instance = instance;
            }
            WmWindowProperty::Protocols => {
                if let Some(protocols) = self.read_list_property(&conn, self.atoms.WM_PROTOCOLS, AtomEnum::ATOM)? {
                    self.state.lock().unwrap().protocols = protocols
                        .into_iter()
                        .filter_map(|atom| match atom {
                            a if a == self.atoms.WM_TAKE_FOCUS => Some(WmProtocol::TakeFocus),
                            a if a == self.atoms.WM_DELETE_WINDOW => Some(WmProtocol::DeleteWindow),
                            _ => None,
                        })
                        .collect();
                }
            }
            WmWindowProperty::Hints => {
                let hints = match WmHints::get(&*conn, self.window)?.reply_unchecked() {
                    Ok(hints) => hints,
                    Err(ConnectionError::ParseError(_)) => None,
                    Err(err) => return Err(err),
                };
                self.state.lock().unwrap().hints = hints;
            }
            WmWindowProperty::NormalHints => {
                let hints = match WmSizeHints::get_normal_hints(&*conn, self.window)?.reply_unchecked() {
                    Ok(hints) => hints,
                    Err(ConnectionError::ParseError(_)) => None,
                    Err(err) => return Err(err),
                };
                self.state.lock().unwrap().normal_hints = hints;
            }
            WmWindowProperty::TransientFor => {
                let parent = self
                    .property_reply(&conn, AtomEnum::WM_TRANSIENT_FOR, AtomEnum::WINDOW, 1)?
                    .and_then(|reply| reply.value32()?.next())
                    .filter(|w| *w != 0);
                self.state.lock().unwrap().transient_for = parent;
            }
            WmWindowProperty::WindowType => {
                let types = self
                    .read_list_property(&conn, self.atoms._NET_WM_WINDOW_TYPE, AtomEnum::ATOM)?
                    .unwrap_or_default();
                self.state.lock().unwrap().window_type = types;
            }
            WmWindowProperty::MotifHints => {
                if let Some(hints) = self.read_list_property(&conn, self.atoms._MOTIF_WM_HINTS, AtomEnum::ANY)? {
                    if hints.len() >= 5 {
                        self.state.lock().unwrap().motif_hints = hints;
                    }
                }
            }
            WmWindowProperty::StartupId => {
                if let Some(startup_id) = self.read_string_property(&conn, self.atoms._NET_STARTUP_ID)? {
                    self.state.lock().unwrap().startup_id = Some(startup_id);
                }
            }
            WmWindowProperty::Pid => {
                let pid = self
                    .property_reply(&conn, self.atoms._NET_WM_PID, AtomEnum::CARDINAL, 1)?
                    .and_then(|reply| reply.value32()?.next());
                if pid.is_some() {
                    self.state.lock().unwrap().pid = pid;
                }
            }
        }
        Ok(())
    }

    /// Fetch a property, tolerating windows that vanished mid-request.
    ///
    /// `None` covers the property being unset, the window being gone and
    /// malformed replies alike; only real connection failures surface.
    fn property_reply(
        &self,
        conn: &RustConnection,
        property: impl Into<Atom>,
        type_: impl Into<Atom>,
        long_length: u32,
    ) -> Result<Option<GetPropertyReply>, ConnectionError> {
        match conn
            .get_property(false, self.window, property, type_, 0, long_length)?
            .reply_unchecked()
        {
            Ok(reply) => Ok(reply.filter(|r| r.type_ != x11rb::NONE)),
            Err(ConnectionError::ParseError(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn read_string_property(
        &self,
        conn: &RustConnection,
        property: impl Into<Atom>,
    ) -> Result<Option<String>, ConnectionError> {
        let Some(reply) = self.property_reply(conn, property, AtomEnum::ANY, 2048)? else {
            return Ok(None);
        };
        let text = match reply.type_ {
            t if t == self.atoms.UTF8_STRING => String::from_utf8(reply.value).ok(),
            t if t == u32::from(AtomEnum::STRING) => Some(WINDOWS_1252.decode(&reply.value).0.into_owned()),
            _ => None,
        };
        Ok(text)
    }

    fn read_list_property(
        &self,
        conn: &RustConnection,
        property: impl Into<Atom>,
        type_: AtomEnum,
    ) -> Result<Option<Vec<u32>>, ConnectionError> {
        Ok(self
            .property_reply(conn, property, type_, 2048)?
            .and_then(|reply| Some(reply.value32()?.collect())))
    }
}

/// Motif hints explicitly ask for no server-side decorations.
fn decorations_disabled_by_motif(motif_hints: &[u32]) -> bool {
    if motif_hints.len() <= MWM_HINTS_DECORATIONS_FIELD {
        return false;
    }
    (motif_hints[MWM_HINTS_FLAGS_FIELD] & MWM_HINTS_DECORATIONS) != 0
        && motif_hints[MWM_HINTS_DECORATIONS_FIELD] == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xwm::test_atoms;

    fn test_surface(window: X11Window) -> X11Surface {
        X11Surface::new(
            XwmId(0),
            window,
            false,
            Weak::new(),
            test_atoms(),
            Rectangle::from_loc_and_size((0, 0), (640, 480)),
        )
    }

    #[test]
    fn passive_input_is_the_default_focus_model() {
        let surface = test_surface(42);
        assert_eq!(surface.focus_protocol(), (true, false));
    }

    #[test]
    fn take_focus_protocol_changes_the_focus_model() {
        let surface = test_surface(42);
        surface.state.lock().unwrap().protocols = vec![WmProtocol::TakeFocus];
        // input defaults to true -> locally active
        assert_eq!(surface.focus_protocol(), (true, true));

        let mut hints = WmHints::new();
        hints.input = Some(false);
        surface.state.lock().unwrap().hints = Some(hints);
        // no input but take-focus -> globally active
        assert_eq!(surface.focus_protocol(), (false, true));
    }

    #[test]
    fn no_input_without_take_focus_never_receives_focus() {
        let surface = test_surface(42);
        let mut hints = WmHints::new();
        hints.input = Some(false);
        surface.state.lock().unwrap().hints = Some(hints);
        assert_eq!(surface.focus_protocol(), (false, false));
    }

    #[test]
    fn motif_decoration_decoding() {
        // no flags set
        assert!(!decorations_disabled_by_motif(&[0, 0, 0, 0, 0]));
        // decorations flag set, decorations disabled
        assert!(decorations_disabled_by_motif(&[MWM_HINTS_DECORATIONS, 0, 0, 0, 0]));
        // decorations flag set, decorations enabled
        assert!(!decorations_disabled_by_motif(&[MWM_HINTS_DECORATIONS, 0, 1, 0, 0]));
        // truncated property
        assert!(!decorations_disabled_by_motif(&[MWM_HINTS_DECORATIONS]));
    }

    #[test]
    fn base_size_falls_back_to_min_size() {
        let surface = test_surface(7);
        let mut hints = WmSizeHints::new();
        hints.min_size = Some((100, 50));
        surface.state.lock().unwrap().normal_hints = Some(hints);

        assert_eq!(surface.base_size(), Some(Size::new(100, 50)));

        let mut hints = WmSizeHints::new();
        hints.min_size = Some((100, 50));
        hints.base_size = Some((10, 20));
        surface.state.lock().unwrap().normal_hints = Some(hints);
        assert_eq!(surface.base_size(), Some(Size::new(10, 20)));
    }

    #[test]
    fn destroyed_surfaces_compare_unequal() {
        let a = test_surface(5);
        let b = a.clone();
        assert!(a == b);
        b.state.lock().unwrap().alive = false;
        assert!(a != b);
    }

    #[test]
    fn only_known_property_atoms_are_tracked() {
        let surface = test_surface(3);
        let atoms = test_atoms();
        assert_eq!(
            surface.property_for_atom(atoms._NET_WM_NAME),
            Some(WmWindowProperty::Title)
        );
        assert_eq!(
            surface.property_for_atom(u32::from(AtomEnum::WM_CLASS)),
            Some(WmWindowProperty::Class)
        );
        assert_eq!(surface.property_for_atom(atoms._NET_WM_PID), Some(WmWindowProperty::Pid));
        // selection and state atoms never reach the property cache
        assert_eq!(surface.property_for_atom(atoms._NET_WM_STATE), None);
        assert_eq!(surface.property_for_atom(atoms.CLIPBOARD), None);
    }
}
