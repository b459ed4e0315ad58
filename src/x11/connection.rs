//! Becoming the window manager
//!
//! Owns the ICCCM `WM_S{n}` selection, redirects substructure on the root
//! and publishes the EWMH support properties.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{
    AtomEnum, ChangeWindowAttributesAux, ConnectionExt, CreateWindowAux, EventMask, PropMode,
    Window, WindowClass,
};
use x11rb::wrapper::ConnectionExt as _;

use crate::x11::atoms::Atoms;

const REPLACE_TIMEOUT: Duration = Duration::from_secs(15);

/// Handles kept after taking over the screen
#[derive(Debug, Clone, Copy)]
pub struct WmSelection {
    pub selection: u32,
    pub owner: Window,
}

pub fn become_wm<C: Connection>(
    conn: &C,
    screen_num: usize,
    atoms: &Atoms,
    replace: bool,
) -> Result<WmSelection> {
    let screen = &conn.setup().roots[screen_num];
    let root = screen.root;

    let selection_name = format!("WM_S{}", screen_num);
    let selection = conn
        .intern_atom(false, selection_name.as_bytes())?
        .reply()
        .context("Failed to intern WM selection atom")?
        .atom;

    let previous = conn
        .get_selection_owner(selection)?
        .reply()
        .context("Failed to get current WM selection owner")?
        .owner;
    if previous != x11rb::NONE {
        if !replace {
            anyhow::bail!(
                "Another window manager is already running (window 0x{:x}). \
                Use --replace to attempt to replace it.",
                previous
            );
        }
        info!("Existing WM detected (window 0x{:x}), replacing", previous);
        // DestroyNotify on the old owner tells us when it is gone
        let _ = conn.change_window_attributes(
            previous,
            &ChangeWindowAttributesAux::new().event_mask(EventMask::STRUCTURE_NOTIFY),
        );
    }

    let owner = conn.generate_id()?;
    conn.create_window(
        screen.root_depth,
        owner,
        root,
        -1000,
        -1000,
        1,
        1,
        0,
        WindowClass::INPUT_OUTPUT,
        0,
        &CreateWindowAux::new()
            .override_redirect(1)
            .event_mask(EventMask::STRUCTURE_NOTIFY | EventMask::PROPERTY_CHANGE),
    )?;
    conn.map_window(owner)?;

    conn.set_selection_owner(owner, selection, x11rb::CURRENT_TIME)?
        .check()
        .context("Failed to set WM selection owner")?;
    let owner_after = conn
        .get_selection_owner(selection)?
        .reply()
        .context("Failed to verify WM selection ownership")?
        .owner;
    if owner_after != owner {
        anyhow::bail!(
            "Failed to acquire WM selection ownership (expected 0x{:x}, got 0x{:x})",
            owner,
            owner_after
        );
    }
    debug!("WM selection {} owned by 0x{:x}", selection_name, owner);

    if previous != x11rb::NONE {
        wait_for_previous(conn, previous)?;
    }

    conn.change_window_attributes(
        root,
        &ChangeWindowAttributesAux::new().event_mask(
            EventMask::SUBSTRUCTURE_REDIRECT
                | EventMask::SUBSTRUCTURE_NOTIFY
                | EventMask::PROPERTY_CHANGE
                | EventMask::FOCUS_CHANGE
                | EventMask::STRUCTURE_NOTIFY,
        ),
    )?
    .check()
    .context("Failed to select events on root window - is another WM running?")?;

    conn.change_property32(
        PropMode::REPLACE,
        root,
        atoms.net_supported,
        AtomEnum::ATOM,
        &atoms.supported(),
    )?;
    for window in [root, owner] {
        conn.change_property32(
            PropMode::REPLACE,
            window,
            atoms.net_supporting_wm_check,
            AtomEnum::WINDOW,
            &[owner],
        )?;
    }
    conn.change_property8(
        PropMode::REPLACE,
        owner,
        atoms.net_wm_name,
        atoms.utf8_string,
        b"area",
    )?;
    conn.flush()?;

    info!("Successfully became window manager on screen {}", screen_num);
    Ok(WmSelection { selection, owner })
}

fn wait_for_previous<C: Connection>(conn: &C, previous: Window) -> Result<()> {
    info!("Waiting for previous WM to exit...");
    let start = Instant::now();
    while start.elapsed() < REPLACE_TIMEOUT {
        if conn.get_window_attributes(previous)?.reply().is_err() {
            info!("Previous WM exited");
            return Ok(());
        }
        conn.flush()?;
        std::thread::sleep(Duration::from_millis(100));
    }
    warn!("Timeout waiting for previous WM to exit, proceeding anyway");
    Ok(())
}
