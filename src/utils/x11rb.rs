//! Calloop event source feeding X11 events to the window manager.

use std::{io, sync::Arc, thread};

use calloop::{
    channel::{sync_channel, Channel, Event as ChannelEvent, SyncSender},
    EventSource, Poll, PostAction, Readiness, Token, TokenFactory,
};
use x11rb::{
    connection::Connection as _,
    protocol::{
        xproto::{Atom, ClientMessageEvent, ConnectionExt as _, EventMask, Window},
        Event,
    },
    rust_connection::RustConnection,
};

/// Adapter exposing an x11rb connection as a calloop event source.
///
/// Readability of the socket is not a usable wakeup signal for a
/// [`RustConnection`]: request/reply traffic reads events off the wire as a
/// side effect and parks them in the connection's internal queue. A dedicated
/// reader thread blocking in `wait_for_event()` sees those queued events too,
/// so it forwards them through a calloop channel instead. The thread holds no
/// window-manager state. Events are delivered in batches so one wakeup drains
/// everything the server sent.
#[derive(Debug)]
pub struct X11Source {
    conn: Arc<RustConnection>,
    rx: Option<Channel<Vec<Event>>>,
    reader: Option<thread::JoinHandle<()>>,
    wake_window: Window,
    wake_type: Atom,
}

impl X11Source {
    /// Spawn the reader thread and wrap it as an event source.
    ///
    /// On drop, a client message of type `wake_type` is sent to
    /// `wake_window` (a window this process owns) purely to kick the reader
    /// out of its blocking wait so it can observe the closed channel.
    pub fn new(conn: Arc<RustConnection>, wake_window: Window, wake_type: Atom) -> Self {
        let (tx, rx) = sync_channel(4);
        let reader = {
            let conn = conn.clone();
            thread::spawn(move || forward_events(&conn, &tx))
        };
        Self {
            conn,
            rx: Some(rx),
            reader: Some(reader),
            wake_window,
            wake_type,
        }
    }
}

fn forward_events(conn: &RustConnection, tx: &SyncSender<Vec<Event>>) {
    loop {
        let mut batch = match conn.wait_for_event() {
            Ok(event) => vec![event],
            Err(err) => {
                // Connection errors are permanent, there is nothing to retry.
                tracing::error!("X11 reader thread exiting: {}", err);
                return;
            }
        };
        while let Ok(Some(event)) = conn.poll_for_event() {
            batch.push(event);
        }
        if tx.send(batch).is_err() {
            // Receiver gone, the source was dropped.
            return;
        }
    }
}

impl Drop for X11Source {
    fn drop(&mut self) {
        // Closing the channel alone leaves the reader parked in
        // wait_for_event(); the self-addressed message below gives it one
        // more event, whose failed send() ends the loop.
        self.rx.take();
        let wake = ClientMessageEvent::new(8, self.wake_window, self.wake_type, [0u8; 20]);
        let _ = self
            .conn
            .send_event(false, self.wake_window, EventMask::NO_EVENT, wake);
        let _ = self.conn.flush();
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
    }
}

impl EventSource for X11Source {
    type Event = Event;
    type Metadata = ();
    type Ret = ();
    type Error = io::Error;

    fn process_events<C>(&mut self, readiness: Readiness, token: Token, mut callback: C) -> io::Result<PostAction>
    where
        C: FnMut(Self::Event, &mut Self::Metadata) -> Self::Ret,
    {
        let Some(rx) = self.rx.as_mut() else {
            return Ok(PostAction::Remove);
        };
        rx.process_events(readiness, token, |message, _| match message {
            ChannelEvent::Msg(batch) => {
                for event in batch {
                    callback(event, &mut ());
                }
            }
            ChannelEvent::Closed => tracing::warn!("X11 reader thread is gone"),
        })
        .map_err(|err| io::Error::new(io::ErrorKind::Other, err))
    }

    fn register(&mut self, poll: &mut Poll, factory: &mut TokenFactory) -> calloop::Result<()> {
        match self.rx.as_mut() {
            Some(rx) => rx.register(poll, factory),
            None => Ok(()),
        }
    }

    fn reregister(&mut self, poll: &mut Poll, factory: &mut TokenFactory) -> calloop::Result<()> {
        match self.rx.as_mut() {
            Some(rx) => rx.reregister(poll, factory),
            None => Ok(()),
        }
    }

    fn unregister(&mut self, poll: &mut Poll) -> calloop::Result<()> {
        match self.rx.as_mut() {
            Some(rx) => rx.unregister(poll),
            None => Ok(()),
        }
    }
}
