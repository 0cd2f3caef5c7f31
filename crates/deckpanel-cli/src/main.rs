//! Deck Panel Control Tool
//!
//! One-shot commands against an attached panel.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use deckpanel_hw::imaging::parse_hex_color;
use deckpanel_hw::text::load_font;
use deckpanel_hw::{
    list_serial_numbers, Link, PanelController, TextButton, BUTTON_COUNT, PRODUCT_ID, VENDOR_ID,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "deckpanelctl")]
#[command(about = "Control tool for the Deck Panel")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Serial number of the panel to use (default: first found)
    #[arg(long, global = true)]
    serial: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List attached panels by serial number
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Fill a button with a solid color
    Color {
        /// Button index (0-14)
        button: usize,
        /// Color in hex format (e.g., #FF0000 for red)
        color: String,
    },
    /// Show an image file on a button
    Image {
        /// Button index (0-14)
        button: usize,
        /// Image file
        path: PathBuf,
    },
    /// Spread one image file across the whole panel
    Panel {
        /// Image file
        path: PathBuf,
    },
    /// Write text on a button
    Text {
        /// Button index (0-14)
        button: usize,
        /// Text to show; use \n for line breaks
        text: String,
        /// TrueType/OpenType font file
        #[arg(long)]
        font: PathBuf,
        /// Font size in pixels
        #[arg(long, default_value = "14")]
        size: f32,
        /// Text color in hex format
        #[arg(long, default_value = "#FFFFFF")]
        color: String,
        /// Background color in hex format
        #[arg(long, default_value = "#000000")]
        background: String,
    },
    /// Clear one button, or all of them
    Clear {
        /// Button index (0-14, omit to clear all)
        button: Option<usize>,
    },
    /// Print button events until interrupted
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let serial = cli.serial.as_deref();
    match cli.command {
        Commands::List { json } => handle_list(json),
        Commands::Color { button, color } => handle_color(serial, button, &color),
        Commands::Image { button, path } => {
            check_button(button)?;
            let panel = open_panel(serial)?;
            panel
                .fill_image_from_file(button, &path)
                .with_context(|| format!("Failed to show {}", path.display()))?;
            println!("Button {} showing {}", button, path.display());
            Ok(())
        }
        Commands::Panel { path } => {
            let panel = open_panel(serial)?;
            panel
                .fill_panel_from_file(&path)
                .with_context(|| format!("Failed to show {}", path.display()))?;
            println!("Panel showing {}", path.display());
            Ok(())
        }
        Commands::Text {
            button,
            text,
            font,
            size,
            color,
            background,
        } => handle_text(
            serial,
            button,
            &text,
            &font,
            size,
            &color,
            &background,
        ),
        Commands::Clear { button } => handle_clear(serial, button),
        Commands::Watch => handle_watch(serial).await,
    }
}

fn check_button(button: usize) -> Result<()> {
    if button >= BUTTON_COUNT {
        bail!("Button must be between 0 and {}", BUTTON_COUNT - 1);
    }
    Ok(())
}

fn parse_color(value: &str) -> Result<[i32; 3]> {
    let Some(rgb) = parse_hex_color(value) else {
        bail!("Invalid color {:?}, expected #RRGGBB", value);
    };
    Ok(rgb.0.map(i32::from))
}

fn open_panel(serial: Option<&str>) -> Result<PanelController> {
    PanelController::open(serial).context("Failed to open panel. Is it plugged in?")
}

fn handle_list(json: bool) -> Result<()> {
    let serials =
        list_serial_numbers(VENDOR_ID, PRODUCT_ID).context("Failed to enumerate USB devices")?;

    if json {
        let output = serde_json::json!({
            "vendor_id": format!("{:04X}", VENDOR_ID),
            "product_id": format!("{:04X}", PRODUCT_ID),
            "panels": serials,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if serials.is_empty() {
        println!("No panels found");
    } else {
        println!("Panels:");
        for serial in &serials {
            println!("  {}", serial);
        }
    }
    Ok(())
}

fn handle_color(serial: Option<&str>, button: usize, color: &str) -> Result<()> {
    check_button(button)?;
    let [r, g, b] = parse_color(color)?;
    let panel = open_panel(serial)?;
    panel.fill_color(button, r, g, b)?;
    println!("Button {} set to: {}", button, color);
    Ok(())
}

fn handle_text(
    serial: Option<&str>,
    button: usize,
    text: &str,
    font: &Path,
    size: f32,
    color: &str,
    background: &str,
) -> Result<()> {
    check_button(button)?;
    if size <= 0.0 {
        bail!("Font size must be positive");
    }
    let color =
        parse_hex_color(color).with_context(|| format!("Invalid text color {:?}", color))?;
    let background = parse_hex_color(background)
        .with_context(|| format!("Invalid background color {:?}", background))?;
    let font =
        load_font(font).with_context(|| format!("Failed to load font {}", font.display()))?;

    let text = text.replace("\\n", "\n");
    let label = TextButton::centered(&text, font, size, color, background);

    let panel = open_panel(serial)?;
    panel.write_text(button, &label)?;
    println!("Button {} showing text", button);
    Ok(())
}

fn handle_clear(serial: Option<&str>, button: Option<usize>) -> Result<()> {
    if let Some(button) = button {
        check_button(button)?;
    }
    let panel = open_panel(serial)?;
    match button {
        Some(button) => {
            panel.clear_button(button)?;
            println!("Button {} cleared", button);
        }
        None => {
            panel.clear_all()?;
            println!("Panel cleared");
        }
    }
    Ok(())
}

async fn handle_watch(serial: Option<&str>) -> Result<()> {
    let panel = Arc::new(open_panel(serial)?);
    if let Ok(serial) = panel.link().serial_number() {
        println!("Watching panel {} (Ctrl-C to stop)", serial);
    }

    panel.set_event_callback(|button, state| {
        println!("Button {} {}", button, state);
    })?;
    panel.on_connect(|| println!("Panel reconnected"))?;

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

    tokio::select! {
        result = done_rx => {
            result.context("Event loop exited unexpectedly")??;
        }
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for Ctrl-C")?;
            info!("Interrupted");
        }
    }

    cancel.store(true, Ordering::Release);
    panel.close()?;
    Ok(())
}
