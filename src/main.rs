//! Area Client
//!
//! Runs the window lifecycle core on a live X server.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use area_client::config::Config;
use area_client::wm::{Services, Workspace};
use area_client::x11::{self, Atoms, Shared, X11Display, X11Driver};
use area_client::x11_async::X11EventSource;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "area_client=debug,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting area-client");

    let replace = std::env::args().any(|arg| arg == "--replace" || arg == "-r");
    if replace {
        info!("--replace flag detected: will attempt to replace existing WM");
    }

    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        tokio::spawn(async move {
            tokio::select! {
                _ = sigterm.recv() => info!("Received SIGTERM, shutting down gracefully"),
                _ = sigint.recv() => info!("Received SIGINT, shutting down gracefully"),
            }
            let _ = shutdown_tx.send(()).await;
        });
    }

    if let Err(e) = run(replace, shutdown_rx).await {
        error!("Application error: {:#}", e);
        return Err(e);
    }
    Ok(())
}

async fn run(replace: bool, mut shutdown: mpsc::Receiver<()>) -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;

    let (conn, screen_num) = x11rb::connect(None).context("Failed to connect to X server")?;
    let conn = Arc::new(conn);
    info!("Connected to X server, screen {}", screen_num);

    let atoms = Atoms::new(conn.as_ref()).context("Failed to intern atoms")?;
    let selection = x11::become_wm(conn.as_ref(), screen_num, &atoms, replace)?;
    let events = X11EventSource::new(conn.clone()).context("Failed to initialize X11 event source")?;

    let shared = Shared::default();
    let display = X11Display::new(conn.clone(), screen_num, atoms, shared.clone());
    let services = Services::new(Box::new(display), &config);
    let mut ws = Workspace::new(config, services);
    let mut driver = X11Driver::new(conn, screen_num, atoms, shared, selection);

    ws.set_outputs(driver.query_outputs());
    driver.export_desktops(&ws);
    driver.scan_existing(&mut ws)?;

    info!("Starting main event loop");
    loop {
        while let Some(event) = events.poll_next_event().context("X11 connection lost")? {
            driver.handle_event(&mut ws, event);
        }
        ws.advance_to(Instant::now());
        driver.process_client_events(&mut ws);
        events.flush().context("Failed to flush X11 requests")?;

        if driver.lost_selection {
            break;
        }

        let deadline = ws.next_timer_deadline();
        tokio::select! {
            () = events.wait_readable() => {}
            () = sleep_until(deadline) => {}
            _ = shutdown.recv() => break,
        }
    }

    info!("Releasing managed windows");
    ws.save_session();
    ws.release_all();
    driver.process_client_events(&mut ws);
    events.flush()?;
    Ok(())
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline.into()).await,
        None => std::future::pending().await,
    }
}
