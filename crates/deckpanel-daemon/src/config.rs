//! Configuration management.

use anyhow::{anyhow, Context, Result};
use deckpanel_hw::imaging::parse_hex_color;
use image::Rgb;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Serial number of the panel to drive; the first one found if unset
    #[serde(default)]
    pub serial: Option<String>,

    /// Delay before reconnecting after the link drops, in milliseconds
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_ms: u64,

    /// Font used for button labels
    #[serde(default)]
    pub font: Option<PathBuf>,

    /// Label font size in pixels
    #[serde(default = "default_font_size")]
    pub font_size: f32,

    /// Label text color (hex)
    #[serde(default = "default_label_color")]
    pub label_color: String,

    /// Background of a pressed button (hex)
    #[serde(default = "default_highlight")]
    pub highlight: String,

    /// Page shown at startup
    #[serde(default = "default_start_page")]
    pub start_page: String,

    /// Button that returns to the parent page on child pages
    #[serde(default)]
    pub back_button: usize,

    /// Button pages
    #[serde(default)]
    pub pages: Vec<PageConfig>,
}

/// One page of buttons.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageConfig {
    pub name: String,

    #[serde(default)]
    pub buttons: Vec<ButtonConfig>,
}

/// One button on a page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ButtonConfig {
    /// Button index (0-14)
    pub index: usize,

    #[serde(default)]
    pub label: Option<String>,

    /// Background color (hex)
    #[serde(default = "default_button_color")]
    pub color: String,

    /// Image shown instead of the background color
    #[serde(default)]
    pub image: Option<PathBuf>,

    /// Name of the page this button opens
    #[serde(default)]
    pub open: Option<String>,
}

// Default value functions
fn default_reconnect_delay() -> u64 {
    1000
}

fn default_font_size() -> f32 {
    14.0
}

fn default_label_color() -> String {
    "#FFFFFF".to_string()
}

fn default_highlight() -> String {
    "#000099".to_string()
}

fn default_start_page() -> String {
    "home".to_string()
}

fn default_button_color() -> String {
    "#000000".to_string()
}

/// Parses a configured color, naming the offending field on failure.
pub fn color(field: &str, value: &str) -> Result<Rgb<u8>> {
    parse_hex_color(value).ok_or_else(|| anyhow!("Invalid color for {}: {:?}", field, value))
}

impl Config {
    /// Loads configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content =
            std::fs::read_to_string(path.as_ref()).context("Failed to read configuration file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse configuration")?;
        Ok(config)
    }

    /// Loads configuration, first writing the defaults if the file does not exist.
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Self::load(path);
        }

        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).context("Failed to create configuration directory")?;
        }
        let config = Config::default();
        config.save(path)?;
        info!("Wrote default configuration to: {}", path.display());
        Ok(config)
    }

    /// Saves configuration to a TOML file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;
        std::fs::write(path.as_ref(), content).context("Failed to write configuration file")?;
        Ok(())
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn label_color(&self) -> Result<Rgb<u8>> {
        color("label_color", &self.label_color)
    }

    pub fn highlight(&self) -> Result<Rgb<u8>> {
        color("highlight", &self.highlight)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            serial: None,
            reconnect_delay_ms: default_reconnect_delay(),
            font: None,
            font_size: default_font_size(),
            label_color: default_label_color(),
            highlight: default_highlight(),
            start_page: default_start_page(),
            back_button: 0,
            pages: vec![PageConfig {
                name: default_start_page(),
                buttons: Vec::new(),
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r##"
        serial = "A00001"
        font = "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf"
        highlight = "#990000"

        [[pages]]
        name = "home"

        [[pages.buttons]]
        index = 0
        label = "Media"
        color = "#202020"
        open = "media"

        [[pages.buttons]]
        index = 4
        image = "icons/mute.png"

        [[pages]]
        name = "media"
    "##;

    #[test]
    fn test_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.serial, None);
        assert_eq!(config.reconnect_delay(), Duration::from_secs(1));
        assert_eq!(config.font_size, 14.0);
        assert_eq!(config.label_color().unwrap(), Rgb([255, 255, 255]));
        assert_eq!(config.highlight().unwrap(), Rgb([0, 0, 0x99]));
        assert_eq!(config.start_page, "home");
        assert_eq!(config.back_button, 0);
        assert!(config.pages.is_empty());
    }

    #[test]
    fn test_parse_pages() {
        let config: Config = toml::from_str(SAMPLE).unwrap();
        assert_eq!(config.serial.as_deref(), Some("A00001"));
        assert_eq!(config.highlight().unwrap(), Rgb([0x99, 0, 0]));
        assert_eq!(config.pages.len(), 2);

        let home = &config.pages[0];
        assert_eq!(home.buttons.len(), 2);
        assert_eq!(home.buttons[0].open.as_deref(), Some("media"));
        assert_eq!(home.buttons[1].color, "#000000");
        assert_eq!(
            home.buttons[1].image.as_deref(),
            Some(Path::new("icons/mute.png"))
        );
        assert!(config.pages[1].buttons.is_empty());
    }

    #[test]
    fn test_invalid_color_names_field() {
        let config = Config {
            label_color: "white".to_string(),
            ..Config::default()
        };
        let err = config.label_color().unwrap_err();
        assert!(err.to_string().contains("label_color"));
    }

    #[test]
    fn test_save_and_load() {
        let config: Config = toml::from_str(SAMPLE).unwrap();
        let path = std::env::temp_dir().join(format!("deckpaneld-{}.toml", std::process::id()));
        config.save(&path).unwrap();
        let loaded = Config::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(loaded.serial, config.serial);
        assert_eq!(loaded.pages.len(), 2);
        assert_eq!(loaded.pages[0].buttons[0].label.as_deref(), Some("Media"));
    }

    #[test]
    fn test_load_or_create_writes_defaults() {
        let dir = std::env::temp_dir().join(format!("deckpaneld-new-{}", std::process::id()));
        let path = dir.join("config.toml");
        let _ = std::fs::remove_dir_all(&dir);

        let created = Config::load_or_create(&path).unwrap();
        assert!(path.exists());
        assert_eq!(created.pages.len(), 1);
        assert_eq!(created.pages[0].name, created.start_page);

        // Second call reads the file back instead of overwriting it.
        let loaded = Config::load_or_create(&path).unwrap();
        std::fs::remove_dir_all(&dir).unwrap();
        assert_eq!(loaded.start_page, "home");
        assert_eq!(loaded.reconnect_delay_ms, created.reconnect_delay_ms);
        assert_eq!(loaded.pages.len(), 1);
    }
}
