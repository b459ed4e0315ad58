//! Readable notifications for the X11 socket
//!
//! x11rb only offers blocking or polling reads. A blocking tokio task waits
//! on the socket with mio and wakes the event loop, which then drains the
//! connection without blocking.

use std::os::unix::io::AsRawFd;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{Notify, oneshot};
use x11rb::connection::Connection;
use x11rb::protocol::Event;
use x11rb::rust_connection::RustConnection;

const SOCKET: mio::Token = mio::Token(0);
/// How often the watcher checks whether the loop is still alive
const WATCH_INTERVAL: Duration = Duration::from_millis(100);

pub struct X11EventSource {
    conn: Arc<RustConnection>,
    readable: Arc<Notify>,
    /// Dropping this stops the watcher
    _alive: oneshot::Receiver<()>,
}

impl X11EventSource {
    pub fn new(conn: Arc<RustConnection>) -> Result<Self> {
        let fd = conn.stream().as_raw_fd();
        let readable = Arc::new(Notify::new());
        let notify = readable.clone();

        let mut poll = mio::Poll::new().context("Failed to create mio Poll")?;
        poll.registry()
            .register(&mut mio::unix::SourceFd(&fd), SOCKET, mio::Interest::READABLE)
            .context("Failed to register X11 socket with mio")?;

        let (watcher_alive, alive) = oneshot::channel::<()>();
        tokio::task::spawn_blocking(move || {
            let mut events = mio::Events::with_capacity(1);
            loop {
                if watcher_alive.is_closed() {
                    tracing::debug!("X11 socket watcher stopped");
                    return;
                }
                if let Err(e) = poll.poll(&mut events, Some(WATCH_INTERVAL)) {
                    tracing::warn!("X11 socket poll failed: {}", e);
                    continue;
                }
                if events.iter().any(|event| event.token() == SOCKET) {
                    notify.notify_one();
                }
            }
        });

        Ok(Self { conn, readable, _alive: alive })
    }

    /// Next buffered event, `None` once the connection is drained
    pub fn poll_next_event(&self) -> Result<Option<Event>> {
        Ok(self.conn.poll_for_event()?)
    }

    pub async fn wait_readable(&self) {
        self.readable.notified().await;
    }

    /// Push queued requests to the server
    pub fn flush(&self) -> Result<()> {
        self.conn.flush()?;
        Ok(())
    }
}
