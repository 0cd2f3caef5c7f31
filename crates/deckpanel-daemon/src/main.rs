//! Deck Panel Daemon
//!
//! Shows configured button pages on the panel and navigates between them
//! as buttons are pressed.

mod config;
mod pages;
mod render;

use anyhow::{Context, Result};
use deckpanel_hw::{ButtonState, PanelController};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use config::Config;
use pages::{Navigator, Redraw};
use render::Renderer;

/// Events forwarded from the panel callbacks to the page thread.
#[derive(Debug)]
enum PanelEvent {
    Button(usize, ButtonState),
    Connected,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Setup logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/default.toml".to_string());

    let config = Config::load_or_create(&config_path).context("Failed to load configuration")?;
    info!("Loaded configuration from: {}", config_path);

    let mut navigator = Navigator::from_config(&config).context("Invalid page configuration")?;
    let mut renderer = Renderer::new(&config)?;

    let panel = Arc::new(
        PanelController::open(config.serial.as_deref())
            .context("Failed to open panel")?
            .with_reconnect_delay(config.reconnect_delay()),
    );
    renderer
        .draw_page(&*panel, &navigator)
        .context("Failed to draw start page")?;

    // Callbacks only forward; the page thread owns navigation and drawing.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<PanelEvent>();
    let button_tx = event_tx.clone();
    panel.set_event_callback(move |index, state| {
        let _ = button_tx.send(PanelEvent::Button(index, state));
    })?;
    panel.on_connect(move || {
        let _ = event_tx.send(PanelEvent::Connected);
    })?;
    panel.on_connect_failure(|e| error!("Panel lost: {}", e))?;

    let page_panel = panel.clone();
    std::thread::Builder::new()
        .name("pages".to_string())
        .spawn(move || {
            while let Some(event) = event_rx.blocking_recv() {
                let result = match event {
                    PanelEvent::Button(index, state) => match navigator.handle(index, state) {
                        Redraw::Nothing => Ok(()),
                        Redraw::Button(index) => {
                            renderer.draw(&*page_panel, index, navigator.look(index))
                        }
                        Redraw::Page => {
                            info!("Showing page '{}'", navigator.current().name);
                            renderer.draw_page(&*page_panel, &navigator)
                        }
                    },
                    PanelEvent::Connected => renderer.draw_page(&*page_panel, &navigator),
                };
                if let Err(e) = result {
                    warn!("Failed to update panel: {}", e);
                }
            }
        })
        .context("Failed to start page thread")?;

    // The event loop blocks on USB reads, so it gets its own thread.
    let cancel = Arc::new(AtomicBool::new(false));
    let (done_tx, done_rx) = oneshot::channel();
    let loop_panel = panel.clone();
    let loop_cancel = cancel.clone();
    std::thread::Builder::new()
        .name("panel-events".to_string())
        .spawn(move || {
            let _ = done_tx.send(loop_panel.run(&loop_cancel));
        })
        .context("Failed to start event loop")?;

    // Setup Unix signal handlers
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())?;

    let outcome = tokio::select! {
        result = done_rx => {
            result.context("Event loop exited unexpectedly")?
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down");
            Ok(())
        }
        _ = sigint.recv() => {
            info!("Received SIGINT, shutting down");
            Ok(())
        }
    };

    cancel.store(true, Ordering::Release);
    if let Err(e) = panel.close() {
        warn!("Failed to close panel cleanly: {}", e);
    }

    outcome.context("Panel event loop failed")
}
