//! X11 window manager core.
//!
//! [`X11Wm`] registers itself as the window manager of an Xwayland instance
//! over an already-connected socket, tracks every X11 window the server
//! announces and bridges the ICCCM selections (clipboard, primary and
//! drag'n'drop) to the compositor's data-transfer machinery.
//!
//! The compositor implements [`XwmHandler`] and inserts the manager into its
//! [`calloop`] event loop:
//!
//! ```no_run
//! # use xwayland_wm::utils::Rectangle;
//! # use xwayland_wm::xwm::{Reorder, ResizeEdge, SelectionTarget, X11Surface, X11Wm, XwmHandler, XwmId};
//! # use std::os::fd::OwnedFd;
//! struct State { /* ... */ }
//! impl XwmHandler for State {
//!     fn xwm_state(&mut self, xwm: XwmId) -> &mut X11Wm {
//! #       unreachable!()
//!         // ...
//!     }
//!     fn new_window(&mut self, xwm: XwmId, window: X11Surface) { /* ... */ }
//!     fn new_override_redirect_window(&mut self, xwm: XwmId, window: X11Surface) { /* ... */ }
//!     fn map_window_request(&mut self, xwm: XwmId, window: X11Surface) { /* ... */ }
//!     fn mapped_override_redirect_window(&mut self, xwm: XwmId, window: X11Surface) { /* ... */ }
//!     fn unmapped_window(&mut self, xwm: XwmId, window: X11Surface) { /* ... */ }
//!     fn destroyed_window(&mut self, xwm: XwmId, window: X11Surface) { /* ... */ }
//!     fn configure_request(&mut self, xwm: XwmId, window: X11Surface, x: Option<i32>, y: Option<i32>, w: Option<u32>, h: Option<u32>, reorder: Option<Reorder>) { /* ... */ }
//!     fn configure_notify(&mut self, xwm: XwmId, window: X11Surface, geometry: Rectangle, above: Option<u32>) { /* ... */ }
//!     fn resize_request(&mut self, xwm: XwmId, window: X11Surface, button: u32, resize_edge: ResizeEdge) { /* ... */ }
//!     fn move_request(&mut self, xwm: XwmId, window: X11Surface, button: u32) { /* ... */ }
//!     fn send_selection(&mut self, xwm: XwmId, selection: SelectionTarget, mime_type: String, fd: OwnedFd) { /* ... */ }
//!     fn new_selection(&mut self, xwm: XwmId, selection: SelectionTarget, mime_types: Vec<String>) { /* ... */ }
//!     fn cleared_selection(&mut self, xwm: XwmId, selection: SelectionTarget) { /* ... */ }
//! }
//! #
//! # let handle: calloop::LoopHandle<'static, State> = unreachable!();
//! # let stream: std::os::unix::net::UnixStream = unreachable!();
//! let wm = X11Wm::start_wm(handle, stream).expect("Failed to attach the X11 window manager");
//! // store the WM somewhere and drop it when Xwayland exits
//! ```

use std::{
    collections::HashMap,
    ops::Deref,
    os::unix::net::UnixStream,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Weak,
    },
};

use calloop::LoopHandle;
use tracing::{debug, trace, warn};
use x11rb::{
    connection::{Connection as _, RequestConnection as _},
    errors::{ConnectError, ConnectionError, ReplyError, ReplyOrIdError},
    protocol::{
        composite::{ConnectionExt as _, Redirect},
        render::{self, ConnectionExt as _, CreatePictureAux, PictType, Pictformat, PictureWrapper},
        res,
        xfixes::ConnectionExt as _,
        xproto::{
            Atom, AtomEnum, ChangeWindowAttributesAux, ClientMessageEvent, ColormapAlloc, ConfigWindow,
            ConfigureNotifyEvent, ConfigureWindowAux, ConnectionExt as _, CreateGCAux, EventMask,
            GcontextWrapper, ImageFormat, InputFocus, NotifyDetail, NotifyMode, PixmapWrapper, PropMode,
            Screen, StackMode, Visualid, Window as X11Window, WindowClass, CONFIGURE_NOTIFY_EVENT,
        },
        Event,
    },
    rust_connection::{DefaultStream, RustConnection},
    wrapper::ConnectionExt as _,
    COPY_FROM_PARENT, CURRENT_TIME, NONE,
};

use crate::utils::{x11rb::X11Source, Point, Rectangle, Size};

mod dnd;
mod selection;
mod surface;

pub use self::dnd::{DndAction, X11DataDevice, X11DataOffer};
pub use self::selection::{SelectionTarget, INCR_CHUNK_SIZE, TRANSFER_STEP_TIMEOUT};
pub use self::surface::{WmWindowProperty, WmWindowType, X11Surface, X11SurfaceError};

use self::dnd::XwmDnd;
use self::selection::XwmSelection;

#[allow(missing_docs)]
mod atoms {
    x11rb::atom_manager! {
        /// Atoms used by the window manager and its surfaces
        pub Atoms:
        AtomsCookie {
            // wayland glue
            WL_SURFACE_ID,
            _WL_SELECTION,
            _XWM_CLOSE_CONNECTION,

            // data formats
            UTF8_STRING,
            TEXT,
            INCR,
            TARGETS,
            TIMESTAMP,

            // selections
            CLIPBOARD,
            PRIMARY,
            XdndSelection,

            // client -> server
            WM_HINTS,
            WM_PROTOCOLS,
            WM_TAKE_FOCUS,
            WM_DELETE_WINDOW,
            WM_CHANGE_STATE,
            _NET_WM_NAME,
            _NET_WM_MOVERESIZE,
            _NET_WM_PID,
            _NET_STARTUP_ID,
            _NET_WM_WINDOW_TYPE,
            _NET_WM_WINDOW_TYPE_DROPDOWN_MENU,
            _NET_WM_WINDOW_TYPE_DIALOG,
            _NET_WM_WINDOW_TYPE_MENU,
            _NET_WM_WINDOW_TYPE_NOTIFICATION,
            _NET_WM_WINDOW_TYPE_NORMAL,
            _NET_WM_WINDOW_TYPE_POPUP_MENU,
            _NET_WM_WINDOW_TYPE_SPLASH,
            _NET_WM_WINDOW_TYPE_TOOLBAR,
            _NET_WM_WINDOW_TYPE_TOOLTIP,
            _NET_WM_WINDOW_TYPE_UTILITY,
            _NET_WM_STATE_MODAL,
            _MOTIF_WM_HINTS,

            // server -> client
            WM_S0,
            WM_STATE,
            _NET_WM_CM_S0,
            _NET_SUPPORTED,
            _NET_ACTIVE_WINDOW,
            _NET_CLIENT_LIST,
            _NET_CLIENT_LIST_STACKING,
            _NET_WM_STATE,
            _NET_WM_STATE_MAXIMIZED_VERT,
            _NET_WM_STATE_MAXIMIZED_HORZ,
            _NET_WM_STATE_HIDDEN,
            _NET_WM_STATE_FULLSCREEN,
            _NET_WM_STATE_FOCUSED,
            _NET_SUPPORTING_WM_CHECK,

            // drag'n'drop
            XdndAware,
            XdndTypeList,
            XdndEnter,
            XdndPosition,
            XdndStatus,
            XdndLeave,
            XdndDrop,
            XdndFinished,
            XdndActionCopy,
            XdndActionMove,
            XdndActionAsk,
        }
    }
}
pub use self::atoms::Atoms;

static NEXT_XWM_ID: AtomicUsize = AtomicUsize::new(1);

/// Id of an X11 WM instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct XwmId(usize);

/// Window asks to be re-stacked
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Reorder {
    /// to the top of the stack
    Top,
    /// directly above the given window id
    Above(X11Window),
    /// directly below the given window id
    Below(X11Window),
    /// to the bottom of the stack
    Bottom,
}

/// Edge values for resizing
///
// These values are used to indicate which edge of a surface is being dragged in a resize operation.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum ResizeEdge {
    Top,
    Bottom,
    Left,
    TopLeft,
    BottomLeft,
    Right,
    TopRight,
    BottomRight,
}

/// Errors raised while bootstrapping or driving an [`X11Wm`]
#[derive(Debug, thiserror::Error)]
pub enum XwmError {
    /// Wrapping the provided socket for the X11 connection failed
    #[error("Failed to wrap the X11 socket")]
    Io(#[from] std::io::Error),
    /// Establishing the X11 connection over the provided socket failed
    #[error(transparent)]
    Connect(#[from] ConnectError),
    /// Error on the underlying X11 connection
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    /// The X server rejected or failed a request
    #[error(transparent)]
    Reply(#[from] ReplyError),
    /// The X server rejected or failed a request
    #[error(transparent)]
    Protocol(#[from] ReplyOrIdError),
    /// The X server is missing a required extension
    #[error("The X server is missing the {0} extension")]
    MissingExtension(&'static str),
    /// No 32-bit visual was advertised by the X server
    #[error("The X screen advertises no 32-bit visual")]
    NoVisual,
    /// No X11 client currently owns the selection
    #[error("No X11 client currently owns the {0:?} selection")]
    SelectionUnavailable(SelectionTarget),
    /// A source could not be registered with the event loop
    #[error("Failed to register an event source with the event loop")]
    EventLoop,
}

/// Handler trait for [`X11Wm`] interactions.
///
/// Implemented by the compositor state; every callback runs on the event
/// loop thread from within event dispatch.
pub trait XwmHandler {
    /// [`X11Wm`] getter for a given ID.
    fn xwm_state(&mut self, xwm: XwmId) -> &mut X11Wm;

    /// A new X11 window was created.
    ///
    /// New windows are not mapped yet, but various information is already accessible.
    /// In general new windows will either stay in this state, if they serve secondary purposes
    /// or request to be mapped shortly afterwards.
    fn new_window(&mut self, xwm: XwmId, window: X11Surface);
    /// A new X11 window with the override redirect flag.
    ///
    /// Window managers are not supposed to manage these windows and thus
    /// cannot intercept most operations (including mapping). It is best to
    /// replicate their state in the compositor as faithfully as possible
    /// without touching them.
    fn new_override_redirect_window(&mut self, xwm: XwmId, window: X11Surface);
    /// Window requests to be mapped.
    ///
    /// To grant the wish call `X11Surface::set_mapped(true)` for the window to become visible.
    fn map_window_request(&mut self, xwm: XwmId, window: X11Surface);
    /// Override redirect window was mapped.
    ///
    /// This is a notification, mapping cannot be prevented for override redirect windows.
    fn mapped_override_redirect_window(&mut self, xwm: XwmId, window: X11Surface);
    /// Window was unmapped.
    fn unmapped_window(&mut self, xwm: XwmId, window: X11Surface);
    /// Window was destroyed.
    fn destroyed_window(&mut self, xwm: XwmId, window: X11Surface);

    /// Window asks to be positioned, sized or stacked differently.
    ///
    /// Requests can be granted by calling [`X11Surface::configure`] with updated values.
    #[allow(clippy::too_many_arguments)]
    fn configure_request(
        &mut self,
        xwm: XwmId,
        window: X11Surface,
        x: Option<i32>,
        y: Option<i32>,
        w: Option<u32>,
        h: Option<u32>,
        reorder: Option<Reorder>,
    );
    /// An override-redirect window moved, resized or restacked itself.
    ///
    /// The compositor should reflect the new values to avoid stale geometry.
    fn configure_notify(
        &mut self,
        xwm: XwmId,
        window: X11Surface,
        geometry: Rectangle,
        above: Option<X11Window>,
    );

    /// A tracked window property changed.
    fn property_notify(&mut self, xwm: XwmId, window: X11Surface, property: WmWindowProperty) {
        let _ = (xwm, window, property);
    }

    /// The window announced the wayland surface it renders to.
    ///
    /// The id refers to a `wl_surface` protocol object of the Xwayland
    /// client; resolving it is the compositor's business.
    fn surface_associated(&mut self, xwm: XwmId, window: X11Surface, wl_surface: u32) {
        let _ = (xwm, window, wl_surface);
    }
    /// The window lost its wayland surface association (it was unmapped).
    fn surface_dissociated(&mut self, xwm: XwmId, window: X11Surface) {
        let _ = (xwm, window);
    }

    /// Window requests to be maximized.
    fn maximize_request(&mut self, xwm: XwmId, window: X11Surface) {
        let _ = (xwm, window);
    }
    /// Window requests to be unmaximized.
    fn unmaximize_request(&mut self, xwm: XwmId, window: X11Surface) {
        let _ = (xwm, window);
    }
    /// Window requests to be fullscreened.
    fn fullscreen_request(&mut self, xwm: XwmId, window: X11Surface) {
        let _ = (xwm, window);
    }
    /// Window requests to be unfullscreened.
    fn unfullscreen_request(&mut self, xwm: XwmId, window: X11Surface) {
        let _ = (xwm, window);
    }
    /// Window requests to be minimized.
    fn minimize_request(&mut self, xwm: XwmId, window: X11Surface) {
        let _ = (xwm, window);
    }
    /// Window requests to be unminimized.
    fn unminimize_request(&mut self, xwm: XwmId, window: X11Surface) {
        let _ = (xwm, window);
    }

    /// Window requests to be resized interactively.
    ///
    /// The window will be holding a grab on the mouse button provided and requests
    /// to be resized on the edges passed.
    fn resize_request(&mut self, xwm: XwmId, window: X11Surface, button: u32, resize_edge: ResizeEdge);
    /// Window requests to be moved interactively.
    ///
    /// The window will be holding a grab on the mouse button provided.
    fn move_request(&mut self, xwm: XwmId, window: X11Surface, button: u32);

    /// Whether X11 clients may read the given selection.
    ///
    /// Called once per selection request before any data is served.
    fn allow_selection_access(&mut self, xwm: XwmId, selection: SelectionTarget) -> bool {
        let _ = (xwm, selection);
        true
    }
    /// An X11 client asked for compositor-owned selection contents.
    ///
    /// The handler must write the data for `mime_type` into `fd` (and close
    /// it); the transfer machinery streams it on to the requestor.
    fn send_selection(&mut self, xwm: XwmId, selection: SelectionTarget, mime_type: String, fd: std::os::fd::OwnedFd);
    /// An X11 client took ownership of a selection.
    ///
    /// `mime_types` describes the formats the new owner offers; the
    /// compositor should publish a matching offer and pull contents on
    /// demand via [`X11Wm::send_selection`].
    fn new_selection(&mut self, xwm: XwmId, selection: SelectionTarget, mime_types: Vec<String>);
    /// The X11 side of a selection went away.
    fn cleared_selection(&mut self, xwm: XwmId, selection: SelectionTarget);

    /// An X11 client started a drag over the compositor's windows.
    fn dnd_entered(&mut self, xwm: XwmId, offer: X11DataOffer, x: i32, y: i32) {
        let _ = (xwm, offer, x, y);
    }
    /// The X11 drag moved.
    fn dnd_motion(&mut self, xwm: XwmId, x: i32, y: i32) {
        let _ = (xwm, x, y);
    }
    /// The X11 drag left or was cancelled.
    fn dnd_left(&mut self, xwm: XwmId) {
        let _ = xwm;
    }
    /// The X11 drag dropped; contents can be pulled through the active offer.
    fn dnd_dropped(&mut self, xwm: XwmId) {
        let _ = xwm;
    }
}

/// An X11 window owned by the window manager, destroyed with the last handle.
#[derive(Debug, Clone)]
pub(crate) struct OwnedX11Window(Arc<OwnedWindowInner>);

#[derive(Debug)]
struct OwnedWindowInner {
    window: X11Window,
    conn: Weak<RustConnection>,
}

impl OwnedX11Window {
    pub(crate) fn new(window: X11Window, conn: &Arc<RustConnection>) -> Self {
        OwnedX11Window(Arc::new(OwnedWindowInner {
            window,
            conn: Arc::downgrade(conn),
        }))
    }

    #[cfg(test)]
    pub(crate) fn dangling(window: X11Window) -> Self {
        OwnedX11Window(Arc::new(OwnedWindowInner {
            window,
            conn: Weak::new(),
        }))
    }
}

impl Deref for OwnedX11Window {
    type Target = X11Window;
    fn deref(&self) -> &X11Window {
        &self.0.window
    }
}

impl PartialEq<X11Window> for OwnedX11Window {
    fn eq(&self, other: &X11Window) -> bool {
        self.0.window == *other
    }
}

impl Drop for OwnedWindowInner {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.upgrade() {
            let _ = conn.destroy_window(self.window);
            let _ = conn.flush();
        }
    }
}

/// The runtime state of the X11 window manager.
#[derive(Debug)]
pub struct X11Wm {
    id: XwmId,
    conn: Arc<RustConnection>,
    screen: Screen,
    atoms: Atoms,
    wm_window: X11Window,

    #[allow(dead_code)]
    visual_id: Visualid,
    #[allow(dead_code)]
    colormap: u32,
    render_format: Option<Pictformat>,
    has_xres: bool,
    cursor: Option<u32>,

    windows: Vec<X11Surface>,
    // wayland surface id -> window, to keep the association one-to-one
    associations: HashMap<u32, X11Window>,
    // oldest mapped -> newest
    client_list: Vec<X11Window>,
    // bottom -> top
    client_list_stacking: Vec<X11Window>,

    focused_window: Option<X11Window>,
    // wire sequence of the last focus transition, stale focus events are dropped
    last_focus_seq: u16,

    clipboard: XwmSelection,
    primary: XwmSelection,
    dnd: XwmDnd,
    mime_atoms: HashMap<String, Atom>,
    atom_mimes: HashMap<Atom, String>,
}

impl Drop for X11Wm {
    fn drop(&mut self) {
        let _ = self.conn.destroy_window(self.wm_window);
        let _ = self.conn.flush();
    }
}

impl X11Wm {
    /// Take over window management of an Xwayland server.
    ///
    /// ## Arguments
    /// - `handle` is an eventloop handle used to queue up and handle incoming X11 events
    /// - `connection` is the WM end of the socket pair handed to Xwayland at startup
    pub fn start_wm<D>(handle: LoopHandle<'static, D>, connection: UnixStream) -> Result<Self, XwmError>
    where
        D: XwmHandler + 'static,
    {
        // Xwayland only uses screen 0.
        let screen_nr = 0;
        let (stream, _) = DefaultStream::from_unix_stream(connection)?;
        let conn = RustConnection::connect_to_stream(stream, screen_nr)?;
        let atoms = Atoms::new(&conn)?.reply()?;
        let screen = conn.setup().roots[0].clone();

        // Actually become the WM by redirecting some operations
        conn.change_window_attributes(
            screen.root,
            &ChangeWindowAttributesAux::default().event_mask(
                EventMask::SUBSTRUCTURE_REDIRECT
                    | EventMask::SUBSTRUCTURE_NOTIFY
                    | EventMask::PROPERTY_CHANGE
                    | EventMask::FOCUS_CHANGE,
            ),
        )?;

        // The selection engine is built on xfixes ownership notifications.
        conn.extension_information(x11rb::protocol::xfixes::X11_EXTENSION_NAME)?
            .ok_or(XwmError::MissingExtension("XFIXES"))?;
        let xfixes = conn.xfixes_query_version(5, 0)?.reply()?;
        debug!(
            "Using XFIXES v{}.{}",
            xfixes.major_version, xfixes.minor_version
        );
        let has_xres = conn.extension_information(res::X11_EXTENSION_NAME)?.is_some();

        let (visual_id, render_format) = render_capabilities(&conn, &screen)?;
        let colormap = conn.generate_id()?;
        conn.create_colormap(ColormapAlloc::NONE, colormap, screen.root, visual_id)?;

        // Tell Xwayland that we are the WM by acquiring the WM_S0 selection.
        // No X11 clients are accepted before this.
        let win = conn.generate_id()?;
        conn.create_window(
            screen.root_depth,
            win,
            screen.root,
            // x, y, width, height, border width
            0,
            0,
            1,
            1,
            0,
            WindowClass::INPUT_OUTPUT,
            COPY_FROM_PARENT,
            &Default::default(),
        )?;
        conn.set_selection_owner(win, atoms.WM_S0, CURRENT_TIME)?;
        conn.set_selection_owner(win, atoms._NET_WM_CM_S0, CURRENT_TIME)?;
        if conn
            .extension_information(x11rb::protocol::composite::X11_EXTENSION_NAME)?
            .is_some()
        {
            conn.composite_redirect_subwindows(screen.root, Redirect::MANUAL)?;
        } else {
            warn!("X server without Composite, windows will not be redirected");
        }

        // Advertise the supported EWMH surface and empty client lists
        let supported = [
            atoms._NET_WM_STATE,
            atoms._NET_WM_STATE_MAXIMIZED_HORZ,
            atoms._NET_WM_STATE_MAXIMIZED_VERT,
            atoms._NET_WM_STATE_HIDDEN,
            atoms._NET_WM_STATE_FULLSCREEN,
            atoms._NET_WM_STATE_MODAL,
            atoms._NET_WM_STATE_FOCUSED,
            atoms._NET_ACTIVE_WINDOW,
            atoms._NET_WM_MOVERESIZE,
            atoms._NET_CLIENT_LIST,
            atoms._NET_CLIENT_LIST_STACKING,
        ];
        conn.change_property32(PropMode::REPLACE, screen.root, atoms._NET_SUPPORTED, AtomEnum::ATOM, &supported)?;
        let window_lists: [(X11Window, Atom, &[u32]); 5] = [
            (screen.root, atoms._NET_CLIENT_LIST, &[]),
            (screen.root, atoms._NET_CLIENT_LIST_STACKING, &[]),
            (screen.root, atoms._NET_ACTIVE_WINDOW, &[NONE]),
            (screen.root, atoms._NET_SUPPORTING_WM_CHECK, &[win]),
            (win, atoms._NET_SUPPORTING_WM_CHECK, &[win]),
        ];
        for (target, property, value) in window_lists {
            conn.change_property32(PropMode::REPLACE, target, property, AtomEnum::WINDOW, value)?;
        }
        conn.change_property8(
            PropMode::REPLACE,
            win,
            atoms._NET_WM_NAME,
            atoms.UTF8_STRING,
            "xwayland-wm".as_bytes(),
        )?;
        debug!("WM window id: {}", win);
        conn.flush()?;

        let conn = Arc::new(conn);

        // The three selection records subscribe to ownership changes, but do
        // not claim anything until the compositor provides a source.
        let clipboard = XwmSelection::new(&conn, &screen, atoms.CLIPBOARD, SelectionTarget::Clipboard)?;
        let primary = XwmSelection::new(&conn, &screen, atoms.PRIMARY, SelectionTarget::Primary)?;
        let dnd = XwmDnd::new(&conn, &screen, &atoms)?;

        let source = X11Source::new(Arc::clone(&conn), win, atoms._XWM_CLOSE_CONNECTION);
        let id = XwmId(NEXT_XWM_ID.fetch_add(1, Ordering::Relaxed));
        let wm = Self {
            id,
            conn,
            screen,
            atoms,
            wm_window: win,
            visual_id,
            colormap,
            render_format,
            has_xres,
            cursor: None,
            windows: Vec::new(),
            associations: HashMap::new(),
            client_list: Vec::new(),
            client_list_stacking: Vec::new(),
            focused_window: None,
            last_focus_seq: 0,
            clipboard,
            primary,
            dnd,
            mime_atoms: HashMap::new(),
            atom_mimes: HashMap::new(),
        };

        let event_handle = handle.clone();
        handle
            .insert_source(source, move |event, _, data| {
                if let Err(err) = handle_event(data, &event_handle, id, event) {
                    warn!(xwm = ?id, "Failed to handle X11 event: {}", err);
                }
            })
            .map_err(|_| XwmError::EventLoop)?;
        Ok(wm)
    }

    /// Id of this X11 WM
    pub fn id(&self) -> XwmId {
        self.id
    }

    /// Whether querying client PIDs through X-Resource is available
    pub fn has_xres(&self) -> bool {
        self.has_xres
    }

    /// The currently focused X11 window, if any
    pub fn focused_window(&self) -> Option<X11Window> {
        self.focused_window
    }

    fn window_by_id(&self, window: X11Window) -> Option<X11Surface> {
        self.windows.iter().find(|x| x.window_id() == window).cloned()
    }

    fn is_wm_window(&self, window: X11Window) -> bool {
        window == self.wm_window
            || self.clipboard.has_window(window)
            || self.primary.has_window(window)
            || self.dnd.has_window(window)
    }

    /// Move keyboard focus to `window`, or clear X focus entirely.
    ///
    /// Honors the ICCCM input modes of the window (`WM_HINTS` input field and
    /// `WM_TAKE_FOCUS`). The wire sequence of the request is remembered so
    /// focus events racing with a newer transition are discarded.
    pub fn set_focus(&mut self, window: Option<&X11Surface>) -> Result<(), XwmError> {
        match window {
            Some(surface) => {
                let (set_input_focus, send_take_focus) = surface.focus_protocol();
                if set_input_focus {
                    self.last_focus_seq = self
                        .conn
                        .set_input_focus(InputFocus::POINTER_ROOT, surface.window_id(), CURRENT_TIME)?
                        .sequence_number() as u16;
                }
                if send_take_focus {
                    let event = ClientMessageEvent::new(
                        32,
                        surface.window_id(),
                        self.atoms.WM_PROTOCOLS,
                        [self.atoms.WM_TAKE_FOCUS, CURRENT_TIME, 0, 0, 0],
                    );
                    self.conn
                        .send_event(false, surface.window_id(), EventMask::NO_EVENT, event)?;
                }
                self.focused_window = Some(surface.window_id());
                self.conn.change_property32(
                    PropMode::REPLACE,
                    self.screen.root,
                    self.atoms._NET_ACTIVE_WINDOW,
                    AtomEnum::WINDOW,
                    &[surface.window_id()],
                )?;
                // an X surface holding keyboard focus confirms deferred claims
                self.claim_deferred_selections()?;
            }
            None => {
                self.last_focus_seq = self
                    .conn
                    .set_input_focus(InputFocus::POINTER_ROOT, NONE, CURRENT_TIME)?
                    .sequence_number() as u16;
                self.focused_window = None;
                self.conn.change_property32(
                    PropMode::REPLACE,
                    self.screen.root,
                    self.atoms._NET_ACTIVE_WINDOW,
                    AtomEnum::WINDOW,
                    &[NONE],
                )?;
            }
        }
        self.conn.flush()?;
        Ok(())
    }

    /// Raises a window to the top of the X11 stack.
    ///
    /// Needs to be called when the compositor raises the matching toplevel to
    /// keep both stacking orders in sync.
    pub fn raise_window(&mut self, window: &X11Surface) -> Result<(), ConnectionError> {
        if !self.windows.contains(window) {
            return Ok(());
        }
        let _guard = scopeguard::guard((), |_| {
            let _ = self.conn.ungrab_server();
            let _ = self.conn.flush();
        });
        self.conn.grab_server()?;
        self.conn.configure_window(
            window.window_id(),
            &ConfigureWindowAux::new().stack_mode(StackMode::ABOVE),
        )?;
        self.client_list_stacking.retain(|e| *e != window.window_id());
        self.client_list_stacking.push(window.window_id());
        self.publish_client_list_stacking()?;
        Ok(())
    }

    /// Updates the X11 stacking order to follow `order` (given bottom to top).
    ///
    /// Windows unknown to this WM are ignored; windows in the internal stack
    /// that are absent from `order` are skipped over without being moved. The
    /// first window of `order` that is found acts as the anchor.
    pub fn update_stacking_order<'a>(
        &mut self,
        order: impl Iterator<Item = &'a X11Surface>,
    ) -> Result<(), ConnectionError> {
        let _guard = scopeguard::guard((), |_| {
            let _ = self.conn.ungrab_server();
            let _ = self.conn.flush();
        });
        self.conn.grab_server()?;

        let mut last_pos = None;
        for surface in order {
            let pos = self
                .client_list_stacking
                .iter()
                .position(|w| *w == surface.window_id());
            if let (Some(pos), Some(last)) = (pos, last_pos) {
                if last > pos {
                    // move the window directly above the anchor
                    let sibling = self.client_list_stacking[last];
                    let elem = self.client_list_stacking.remove(pos);
                    self.conn.configure_window(
                        elem,
                        &ConfigureWindowAux::new()
                            .sibling(sibling)
                            .stack_mode(StackMode::ABOVE),
                    )?;
                    self.client_list_stacking.insert(last, elem);
                    continue;
                }
            }
            if pos.is_some() {
                last_pos = pos;
            }
        }
        self.publish_client_list_stacking()?;
        Ok(())
    }

    /// Set the default cursor used by X clients.
    ///
    /// `pixels` is expected to be in `rgba`-format with each channel encoded as an u8.
    ///
    /// This function will panic, if `pixels` is not at least `size.w * size.h * 4` long.
    pub fn set_cursor(&mut self, pixels: &[u8], size: Size, hotspot: Point) -> Result<(), XwmError> {
        assert!(pixels.len() >= size.w as usize * size.h as usize * 4usize);
        let render_format = self.render_format.ok_or(XwmError::MissingExtension("RENDER"))?;

        let pixmap =
            PixmapWrapper::create_pixmap(&*self.conn, 32, self.screen.root, size.w as u16, size.h as u16)?;
        let picture = PictureWrapper::create_picture(
            &*self.conn,
            pixmap.pixmap(),
            render_format,
            &CreatePictureAux::new(),
        )?;
        let gc = GcontextWrapper::create_gc(&*self.conn, pixmap.pixmap(), &CreateGCAux::new())?;
        self.conn.put_image(
            ImageFormat::Z_PIXMAP,
            pixmap.pixmap(),
            gc.gcontext(),
            size.w as u16,
            size.h as u16,
            0,
            0,
            0,
            32,
            pixels,
        )?;
        let cursor = self.conn.generate_id()?;
        self.conn
            .render_create_cursor(cursor, picture.picture(), hotspot.x as u16, hotspot.y as u16)?;
        self.conn
            .change_window_attributes(self.screen.root, &ChangeWindowAttributesAux::new().cursor(cursor))?;
        if let Some(old) = self.cursor.replace(cursor) {
            let _ = self.conn.free_cursor(old);
        }
        self.conn.flush()?;
        Ok(())
    }

    fn publish_client_list(&self) -> Result<(), ConnectionError> {
        self.conn.change_property32(
            PropMode::REPLACE,
            self.screen.root,
            self.atoms._NET_CLIENT_LIST,
            AtomEnum::WINDOW,
            &self.client_list,
        )?;
        Ok(())
    }

    fn publish_client_list_stacking(&self) -> Result<(), ConnectionError> {
        self.conn.change_property32(
            PropMode::REPLACE,
            self.screen.root,
            self.atoms._NET_CLIENT_LIST_STACKING,
            AtomEnum::WINDOW,
            &self.client_list_stacking,
        )?;
        Ok(())
    }
}

fn render_capabilities(
    conn: &RustConnection,
    screen: &Screen,
) -> Result<(Visualid, Option<Pictformat>), XwmError> {
    let visual_id = screen
        .allowed_depths
        .iter()
        .filter(|d| d.depth == 32)
        .flat_map(|d| d.visuals.iter())
        .map(|v| v.visual_id)
        .next()
        .ok_or(XwmError::NoVisual)?;

    let render_format = if conn
        .extension_information(render::X11_EXTENSION_NAME)?
        .is_some()
    {
        conn.render_query_pict_formats()?
            .reply()?
            .formats
            .into_iter()
            .find(|f| f.depth == 32 && f.type_ == PictType::DIRECT)
            .map(|f| f.id)
    } else {
        None
    };
    Ok((visual_id, render_format))
}

pub(crate) fn send_configure_notify(
    conn: &RustConnection,
    window: X11Window,
    rect: Rectangle,
    override_redirect: bool,
) -> Result<(), ConnectionError> {
    let event = ConfigureNotifyEvent {
        response_type: CONFIGURE_NOTIFY_EVENT,
        sequence: 0,
        event: window,
        window,
        above_sibling: NONE,
        x: rect.loc.x as i16,
        y: rect.loc.y as i16,
        width: rect.size.w as u16,
        height: rect.size.h as u16,
        border_width: 0,
        override_redirect,
    };
    conn.send_event(false, window, EventMask::STRUCTURE_NOTIFY, event)?;
    Ok(())
}

/// `candidate` is at least as recent as `reference` in wrapping u16 sequence space.
///
/// Wire sequence numbers wrap around, so the comparison checks which half of
/// the range the difference lands in instead of using plain ordering.
fn seq_is_current(candidate: u16, reference: u16) -> bool {
    candidate.wrapping_sub(reference) <= u16::MAX / 2
}

/// Interpret the action field of a `_NET_WM_STATE` client message.
///
/// `Some(true)` asks to enter the state, `Some(false)` to leave it; requests
/// that would not change anything yield `None`.
fn net_state_change(action: u32, currently_set: bool) -> Option<bool> {
    match action {
        0 if currently_set => Some(false), // _NET_WM_STATE_REMOVE
        1 if !currently_set => Some(true), // _NET_WM_STATE_ADD
        2 => Some(!currently_set),         // _NET_WM_STATE_TOGGLE
        _ => None,
    }
}

/// Map a `_NET_WM_MOVERESIZE` direction to the dragged edge, `None` for the
/// move and keyboard variants.
fn moveresize_edge(direction: u32) -> Option<ResizeEdge> {
    let edge = match direction {
        0 => ResizeEdge::TopLeft,
        1 => ResizeEdge::Top,
        2 => ResizeEdge::TopRight,
        3 => ResizeEdge::Right,
        4 => ResizeEdge::BottomRight,
        5 => ResizeEdge::Bottom,
        6 => ResizeEdge::BottomLeft,
        7 => ResizeEdge::Left,
        _ => return None,
    };
    Some(edge)
}

/// Drop `window` from both mapped orderings.
fn forget_window(client_list: &mut Vec<X11Window>, stacking: &mut Vec<X11Window>, window: X11Window) {
    client_list.retain(|w| *w != window);
    stacking.retain(|w| *w != window);
}

/// Re-position `window` inside the bottom-to-top stacking list, placing it
/// directly above `sibling` (or at the bottom without one).
fn restack(stack: &mut Vec<X11Window>, window: X11Window, sibling: Option<X11Window>) {
    let Some(pos) = stack.iter().position(|w| *w == window) else {
        return;
    };
    stack.remove(pos);
    let insert_at = match sibling {
        Some(sibling) => stack
            .iter()
            .position(|w| *w == sibling)
            .map(|i| i + 1)
            .unwrap_or(stack.len()),
        None => 0,
    };
    stack.insert(insert_at, window);
}

fn handle_event<D: XwmHandler + 'static>(
    state: &mut D,
    handle: &LoopHandle<'static, D>,
    xwmid: XwmId,
    event: Event,
) -> Result<(), ReplyOrIdError> {
    let id = xwmid;
    trace!(xwm = ?id, "X11: got event {:?}", event);

    // Transfers and ownership changes take priority over window handling,
    // property events on transfer windows never reach the window table.
    if selection::handle_selection_event(state, handle, id, &event)? {
        return Ok(());
    }
    if dnd::handle_dnd_event(state, id, &event)? {
        return Ok(());
    }

    let xwm = state.xwm_state(id);
    let conn = xwm.conn.clone();
    match event {
        Event::CreateNotify(n) => {
            if xwm.is_wm_window(n.window) {
                return Ok(());
            }
            if xwm.windows.iter().any(|s| s.window_id() == n.window) {
                return Ok(());
            }

            let geo = conn.get_geometry(n.window)?.reply()?;
            // property and focus events are not included in the root's
            // substructure mask, they have to be selected per window
            conn.change_window_attributes(
                n.window,
                &ChangeWindowAttributesAux::new()
                    .event_mask(EventMask::PROPERTY_CHANGE | EventMask::FOCUS_CHANGE),
            )?;
            let surface = X11Surface::new(
                id,
                n.window,
                n.override_redirect,
                Arc::downgrade(&conn),
                xwm.atoms,
                Rectangle::from_loc_and_size(
                    (geo.x as i32, geo.y as i32),
                    (geo.width as i32, geo.height as i32),
                ),
            );
            surface.update_properties()?;
            xwm.windows.push(surface.clone());

            if n.override_redirect {
                state.new_override_redirect_window(id, surface);
            } else {
                state.new_window(id, surface);
            }
        }
        Event::MapRequest(r) => {
            if let Some(surface) = xwm.window_by_id(r.window) {
                surface.update_properties()?;
                state.map_window_request(id, surface);
            }
        }
        Event::MapNotify(n) => {
            trace!("X11 window mapped: {}", n.window);
            if let Some(surface) = xwm.window_by_id(n.window) {
                {
                    let mut sstate = surface.state.lock().unwrap();
                    if sstate.mapped {
                        return Ok(());
                    }
                    sstate.mapped = true;
                }
                xwm.client_list.push(n.window);
                xwm.client_list_stacking.push(n.window);
                conn.change_property32(
                    PropMode::APPEND,
                    xwm.screen.root,
                    xwm.atoms._NET_CLIENT_LIST,
                    AtomEnum::WINDOW,
                    &[n.window],
                )?;
                conn.change_property32(
                    PropMode::APPEND,
                    xwm.screen.root,
                    xwm.atoms._NET_CLIENT_LIST_STACKING,
                    AtomEnum::WINDOW,
                    &[n.window],
                )?;
                surface.update_properties()?;
                if surface.is_override_redirect() {
                    state.mapped_override_redirect_window(id, surface);
                }
            }
        }
        Event::ConfigureRequest(r) => {
            if let Some(surface) = xwm.window_by_id(r.window) {
                let requested = |field: ConfigWindow| u16::from(r.value_mask) & u16::from(field) != 0;
                let reorder = if requested(ConfigWindow::STACK_MODE) {
                    let sibling = requested(ConfigWindow::SIBLING).then_some(r.sibling);
                    match (r.stack_mode, sibling) {
                        (StackMode::ABOVE, Some(sibling)) => Some(Reorder::Above(sibling)),
                        (StackMode::ABOVE, None) => Some(Reorder::Top),
                        (StackMode::BELOW, Some(sibling)) => Some(Reorder::Below(sibling)),
                        (StackMode::BELOW, None) => Some(Reorder::Bottom),
                        _ => None,
                    }
                } else {
                    None
                };
                // Pass the request on to the compositor to decide
                state.configure_request(
                    id,
                    surface.clone(),
                    requested(ConfigWindow::X).then_some(i32::from(r.x)),
                    requested(ConfigWindow::Y).then_some(i32::from(r.y)),
                    requested(ConfigWindow::WIDTH).then_some(u32::from(r.width)),
                    requested(ConfigWindow::HEIGHT).then_some(u32::from(r.height)),
                    reorder,
                );
                // Clients block waiting for the configure ack
                surface.configure(None).map_err(|err| match err {
                    X11SurfaceError::Connection(err) => err,
                    X11SurfaceError::UnsupportedForOverrideRedirect => unreachable!(),
                })?;
            }
        }
        Event::ConfigureNotify(n) => {
            // Managed windows are compositor-positioned, only override
            // redirect windows move themselves around.
            if let Some(surface) = xwm.window_by_id(n.window) {
                if !surface.is_override_redirect() {
                    return Ok(());
                }
                let geometry = Rectangle::from_loc_and_size(
                    (n.x as i32, n.y as i32),
                    (n.width as i32, n.height as i32),
                );
                surface.state.lock().unwrap().geometry = geometry;
                let above = (n.above_sibling != NONE).then_some(n.above_sibling);
                restack(&mut xwm.client_list_stacking, n.window, above);
                xwm.publish_client_list_stacking()?;
                state.configure_notify(id, surface, geometry, above);
            }
        }
        Event::UnmapNotify(n) => {
            if let Some(surface) = xwm.window_by_id(n.window) {
                forget_window(&mut xwm.client_list, &mut xwm.client_list_stacking, n.window);
                {
                    let _guard = scopeguard::guard((), |_| {
                        let _ = conn.ungrab_server();
                    });
                    conn.grab_server()?;
                    xwm.publish_client_list()?;
                    xwm.publish_client_list_stacking()?;
                }
                let was_associated = {
                    let mut sstate = surface.state.lock().unwrap();
                    sstate.mapped = false;
                    sstate.wl_surface_id.take().is_some()
                };
                if was_associated {
                    xwm.associations.retain(|_, w| *w != n.window);
                    state.surface_dissociated(id, surface.clone());
                }
                state.unmapped_window(id, surface);
            }
        }
        Event::DestroyNotify(n) => {
            selection::cleanup_requestor(xwm, handle, n.window);
            xwm.dnd.window_destroyed(n.window);
            if let Some(pos) = xwm.windows.iter().position(|x| x.window_id() == n.window) {
                let surface = xwm.windows.remove(pos);
                surface.state.lock().unwrap().alive = false;
                forget_window(&mut xwm.client_list, &mut xwm.client_list_stacking, n.window);
                xwm.associations.retain(|_, w| *w != n.window);
                if xwm.focused_window == Some(n.window) {
                    xwm.focused_window = None;
                }
                xwm.publish_client_list()?;
                xwm.publish_client_list_stacking()?;
                state.destroyed_window(id, surface);
            }
        }
        Event::PropertyNotify(n) => {
            if let Some(surface) = xwm.window_by_id(n.window) {
                if let Some(property) = surface.update_property(n.atom)? {
                    state.property_notify(id, surface, property);
                }
            }
        }
        Event::FocusIn(n) => {
            // Grab-initiated and pointer-only transitions carry no lasting
            // focus information.
            if matches!(n.mode, NotifyMode::GRAB | NotifyMode::UNGRAB)
                || n.detail == NotifyDetail::POINTER
            {
                return Ok(());
            }
            if !seq_is_current(n.sequence, xwm.last_focus_seq) {
                trace!("Ignoring stale FocusIn for {}", n.event);
                return Ok(());
            }
            xwm.last_focus_seq = n.sequence;
            xwm.focused_window = Some(n.event);
            conn.change_property32(
                PropMode::REPLACE,
                xwm.screen.root,
                xwm.atoms._NET_ACTIVE_WINDOW,
                AtomEnum::WINDOW,
                &[n.event],
            )?;
            xwm.claim_deferred_selections()?;
        }
        Event::FocusOut(n) => {
            if matches!(n.mode, NotifyMode::GRAB | NotifyMode::UNGRAB)
                || n.detail == NotifyDetail::POINTER
            {
                return Ok(());
            }
            if !seq_is_current(n.sequence, xwm.last_focus_seq) {
                trace!("Ignoring stale FocusOut for {}", n.event);
                return Ok(());
            }
            if xwm.focused_window == Some(n.event) {
                xwm.last_focus_seq = n.sequence;
                xwm.focused_window = None;
                conn.change_property32(
                    PropMode::REPLACE,
                    xwm.screen.root,
                    xwm.atoms._NET_ACTIVE_WINDOW,
                    AtomEnum::WINDOW,
                    &[NONE],
                )?;
            }
        }
        Event::ClientMessage(msg) => match msg.type_ {
            x if x == xwm.atoms.WL_SURFACE_ID => {
                let wl_id = msg.data.as_data32()[0];
                debug!("X11 window {} corresponds to wl_surface {}", msg.window, wl_id);
                if let Some(surface) = xwm.window_by_id(msg.window) {
                    // a wayland surface backs at most one window at a time
                    let previous = match xwm.associations.insert(wl_id, msg.window) {
                        Some(old) if old != msg.window => xwm.window_by_id(old).map(|old_surface| {
                            old_surface.state.lock().unwrap().wl_surface_id = None;
                            old_surface
                        }),
                        _ => None,
                    };
                    surface.state.lock().unwrap().wl_surface_id = Some(wl_id);
                    if let Some(old_surface) = previous {
                        state.surface_dissociated(id, old_surface);
                    }
                    state.surface_associated(id, surface, wl_id);
                } else {
                    // The matching CreateNotify may simply not have been
                    // dispatched yet.
                    debug!("wl_surface {} for unknown X11 window {}", wl_id, msg.window);
                }
            }
            x if x == xwm.atoms.WM_CHANGE_STATE => {
                if let Some(surface) = xwm.window_by_id(msg.window) {
                    state.minimize_request(id, surface);
                }
            }
            x if x == xwm.atoms._NET_WM_STATE => {
                if let Some(surface) = xwm.window_by_id(msg.window) {
                    let data = msg.data.as_data32();
                    let (action, first, second) = (data[0], data[1], data[2]);
                    let maximize_part = |atom: Atom| {
                        atom == xwm.atoms._NET_WM_STATE_MAXIMIZED_HORZ
                            || atom == xwm.atoms._NET_WM_STATE_MAXIMIZED_VERT
                    };
                    let fullscreen = xwm.atoms._NET_WM_STATE_FULLSCREEN;
                    if maximize_part(first) && maximize_part(second) && first != second {
                        match net_state_change(action, surface.is_maximized()) {
                            Some(true) => state.maximize_request(id, surface),
                            Some(false) => state.unmaximize_request(id, surface),
                            None => {}
                        }
                    } else if first == fullscreen || second == fullscreen {
                        match net_state_change(action, surface.is_fullscreen()) {
                            Some(true) => state.fullscreen_request(id, surface),
                            Some(false) => state.unfullscreen_request(id, surface),
                            None => {}
                        }
                    }
                }
            }
            x if x == xwm.atoms._NET_WM_MOVERESIZE => {
                // direction 8 is _NET_WM_MOVERESIZE_MOVE, the keyboard-driven
                // variants (9..) are not supported
                if let Some(surface) = xwm.window_by_id(msg.window) {
                    let data = msg.data.as_data32();
                    let (direction, button) = (data[2], data[3]);
                    if let Some(edge) = moveresize_edge(direction) {
                        state.resize_request(id, surface, button, edge);
                    } else if direction == 8 {
                        state.move_request(id, surface, button);
                    }
                }
            }
            x => {
                debug!("Unhandled client message of type {:?}", x);
            }
        },
        Event::Error(err) => {
            // X servers routinely deliver benign errors for race-prone
            // requests, e.g. configuring an already-destroyed window.
            let kind = err.error_kind;
            match err.request_name {
                Some(request) => {
                    warn!(?kind, request, "X11 protocol error");
                }
                None => {
                    warn!(
                        ?kind,
                        opcode = err.major_opcode,
                        bad_value = err.bad_value,
                        "X11 protocol error",
                    );
                }
            }
        }
        _ => {}
    }
    state.xwm_state(id).conn.flush()?;
    Ok(())
}

#[cfg(test)]
pub(crate) fn test_atoms() -> Atoms {
    let mut next = 100u32;
    let mut n = move || {
        next += 1;
        next
    };
    Atoms {
        WL_SURFACE_ID: n(),
        _WL_SELECTION: n(),
        _XWM_CLOSE_CONNECTION: n(),
        UTF8_STRING: n(),
        TEXT: n(),
        INCR: n(),
        TARGETS: n(),
        TIMESTAMP: n(),
        CLIPBOARD: n(),
        PRIMARY: n(),
        XdndSelection: n(),
        WM_HINTS: n(),
        WM_PROTOCOLS: n(),
        WM_TAKE_FOCUS: n(),
        WM_DELETE_WINDOW: n(),
        WM_CHANGE_STATE: n(),
        _NET_WM_NAME: n(),
        _NET_WM_MOVERESIZE: n(),
        _NET_WM_PID: n(),
        _NET_STARTUP_ID: n(),
        _NET_WM_WINDOW_TYPE: n(),
        _NET_WM_WINDOW_TYPE_DROPDOWN_MENU: n(),
        _NET_WM_WINDOW_TYPE_DIALOG: n(),
        _NET_WM_WINDOW_TYPE_MENU: n(),
        _NET_WM_WINDOW_TYPE_NOTIFICATION: n(),
        _NET_WM_WINDOW_TYPE_NORMAL: n(),
        _NET_WM_WINDOW_TYPE_POPUP_MENU: n(),
        _NET_WM_WINDOW_TYPE_SPLASH: n(),
        _NET_WM_WINDOW_TYPE_TOOLBAR: n(),
        _NET_WM_WINDOW_TYPE_TOOLTIP: n(),
        _NET_WM_WINDOW_TYPE_UTILITY: n(),
        _NET_WM_STATE_MODAL: n(),
        _MOTIF_WM_HINTS: n(),
        WM_S0: n(),
        WM_STATE: n(),
        _NET_WM_CM_S0: n(),
        _NET_SUPPORTED: n(),
        _NET_ACTIVE_WINDOW: n(),
        _NET_CLIENT_LIST: n(),
        _NET_CLIENT_LIST_STACKING: n(),
        _NET_WM_STATE: n(),
        _NET_WM_STATE_MAXIMIZED_VERT: n(),
        _NET_WM_STATE_MAXIMIZED_HORZ: n(),
        _NET_WM_STATE_HIDDEN: n(),
        _NET_WM_STATE_FULLSCREEN: n(),
        _NET_WM_STATE_FOCUSED: n(),
        _NET_SUPPORTING_WM_CHECK: n(),
        XdndAware: n(),
        XdndTypeList: n(),
        XdndEnter: n(),
        XdndPosition: n(),
        XdndStatus: n(),
        XdndLeave: n(),
        XdndDrop: n(),
        XdndFinished: n(),
        XdndActionCopy: n(),
        XdndActionMove: n(),
        XdndActionAsk: n(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_focus_events_are_detected() {
        assert!(seq_is_current(10, 10));
        assert!(seq_is_current(11, 10));
        assert!(!seq_is_current(9, 10));
    }

    #[test]
    fn focus_sequence_comparison_survives_wrap_around() {
        // shortly after the u16 sequence space wrapped
        assert!(seq_is_current(3, u16::MAX - 2));
        assert!(!seq_is_current(u16::MAX - 2, 3));
    }

    #[test]
    fn forgotten_windows_leave_no_dangling_ids() {
        let mut client_list = vec![1, 2, 3];
        let mut stacking = vec![3, 1, 2];
        forget_window(&mut client_list, &mut stacking, 1);
        assert_eq!(client_list, vec![2, 3]);
        assert_eq!(stacking, vec![3, 2]);
        // forgetting an already absent window changes nothing
        forget_window(&mut client_list, &mut stacking, 1);
        assert_eq!(client_list, vec![2, 3]);
        assert_eq!(stacking, vec![3, 2]);
    }

    #[test]
    fn restack_places_window_above_sibling() {
        let mut stack = vec![1, 2, 3, 4];
        restack(&mut stack, 1, Some(3));
        assert_eq!(stack, vec![2, 3, 1, 4]);
    }

    #[test]
    fn restack_without_sibling_moves_to_bottom() {
        let mut stack = vec![1, 2, 3];
        restack(&mut stack, 3, None);
        assert_eq!(stack, vec![3, 1, 2]);
    }

    #[test]
    fn restack_with_unknown_sibling_moves_to_top() {
        let mut stack = vec![1, 2, 3];
        restack(&mut stack, 1, Some(99));
        assert_eq!(stack, vec![2, 3, 1]);
    }

    #[test]
    fn restack_ignores_unknown_windows() {
        let mut stack = vec![1, 2];
        restack(&mut stack, 7, Some(1));
        assert_eq!(stack, vec![1, 2]);
    }

    #[test]
    fn redundant_net_state_requests_change_nothing() {
        // add/remove only fire when they flip the state
        assert_eq!(net_state_change(1, false), Some(true));
        assert_eq!(net_state_change(1, true), None);
        assert_eq!(net_state_change(0, true), Some(false));
        assert_eq!(net_state_change(0, false), None);
        // toggle always flips
        assert_eq!(net_state_change(2, false), Some(true));
        assert_eq!(net_state_change(2, true), Some(false));
        // unknown action codes are dropped
        assert_eq!(net_state_change(3, true), None);
    }

    #[test]
    fn moveresize_directions_map_to_edges() {
        assert_eq!(moveresize_edge(0), Some(ResizeEdge::TopLeft));
        assert_eq!(moveresize_edge(4), Some(ResizeEdge::BottomRight));
        assert_eq!(moveresize_edge(7), Some(ResizeEdge::Left));
        // move and keyboard variants carry no edge
        assert_eq!(moveresize_edge(8), None);
        assert_eq!(moveresize_edge(9), None);
    }
}
