//! X11 window management for wayland compositors.
//!
//! This crate implements the window-manager side of an Xwayland session,
//! allowing backwards-compatibility by seamlessly integrating X11 windows into
//! a wayland compositor. It speaks two protocols on behalf of the compositor:
//! the X11 window-management protocol (mapping, stacking, focus,
//! override-redirect handling) and the ICCCM selection protocol (clipboard,
//! primary selection and drag'n'drop), including INCR transfers for payloads
//! larger than a single property.
//!
//! The entry point is [`X11Wm`], which attaches to an already-connected
//! Xwayland socket and registers itself with a [`calloop`] event loop. The
//! compositor participates through the [`XwmHandler`] trait and drives windows
//! through [`X11Surface`] handles.
//!
//! Spawning and supervising the Xwayland server itself, as well as the
//! wayland protocol objects windows end up associated with, are the
//! compositor's business and are only ever referred to by id here.

#![warn(missing_docs, missing_debug_implementations)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod utils;
pub mod xwm;

pub use crate::xwm::{
    DndAction, Reorder, ResizeEdge, SelectionTarget, WmWindowProperty, WmWindowType, X11DataDevice,
    X11DataOffer, X11Surface, X11Wm, XwmError, XwmHandler, XwmId,
};
