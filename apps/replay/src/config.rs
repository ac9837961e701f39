use std::{fs, path::Path, time::Duration};

use anyhow::Context;
use client_core::{ProcessorConfig, ScrollPolicy, ViewState};
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub log_filter: String,
    pub output_fixed_height: bool,
    pub auto_scroll_bottom: bool,
    pub scroll_settle_ms: u64,
    pub container_bottom_padding: u32,
    pub document_bottom_padding: u32,
}

impl Default for Settings {
    fn default() -> Self {
        let view = ViewState::default();
        let scroll = ScrollPolicy::default();
        Self {
            log_filter: "info".into(),
            output_fixed_height: view.output_fixed_height,
            auto_scroll_bottom: view.auto_scroll_bottom,
            scroll_settle_ms: scroll.settle_delay.as_millis() as u64,
            container_bottom_padding: scroll.container_bottom_padding,
            document_bottom_padding: scroll.document_bottom_padding,
        }
    }
}

impl Settings {
    pub fn processor_config(&self) -> ProcessorConfig {
        ProcessorConfig {
            view: ViewState {
                output_fixed_height: self.output_fixed_height,
                auto_scroll_bottom: self.auto_scroll_bottom,
            },
            scroll: ScrollPolicy {
                settle_delay: Duration::from_millis(self.scroll_settle_ms),
                container_bottom_padding: self.container_bottom_padding,
                document_bottom_padding: self.document_bottom_padding,
            },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    log_filter: Option<String>,
    output_fixed_height: Option<bool>,
    auto_scroll_bottom: Option<bool>,
    scroll_settle_ms: Option<u64>,
    container_bottom_padding: Option<u32>,
    document_bottom_padding: Option<u32>,
}

/// Defaults, then `path` if it exists, then `APP__*` environment variables.
pub fn load_settings(path: &Path) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    if path.exists() {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file '{}'", path.display()))?;
        let file_cfg: FileSettings = toml::from_str(&raw)
            .with_context(|| format!("invalid settings file '{}'", path.display()))?;
        apply_file(&mut settings, file_cfg);
    }

    apply_env(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

fn apply_file(settings: &mut Settings, file_cfg: FileSettings) {
    if let Some(v) = file_cfg.log_filter {
        settings.log_filter = v;
    }
    if let Some(v) = file_cfg.output_fixed_height {
        settings.output_fixed_height = v;
    }
    if let Some(v) = file_cfg.auto_scroll_bottom {
        settings.auto_scroll_bottom = v;
    }
    if let Some(v) = file_cfg.scroll_settle_ms {
        settings.scroll_settle_ms = v;
    }
    if let Some(v) = file_cfg.container_bottom_padding {
        settings.container_bottom_padding = v;
    }
    if let Some(v) = file_cfg.document_bottom_padding {
        settings.document_bottom_padding = v;
    }
}

fn apply_env(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("APP__LOG_FILTER") {
        settings.log_filter = v;
    }
    if let Some(v) = var("APP__OUTPUT_FIXED_HEIGHT").and_then(|v| parse_flag(&v)) {
        settings.output_fixed_height = v;
    }
    if let Some(v) = var("APP__AUTO_SCROLL_BOTTOM").and_then(|v| parse_flag(&v)) {
        settings.auto_scroll_bottom = v;
    }
    if let Some(v) = var("APP__SCROLL_SETTLE_MS").and_then(|v| v.parse().ok()) {
        settings.scroll_settle_ms = v;
    }
    if let Some(v) = var("APP__CONTAINER_BOTTOM_PADDING").and_then(|v| v.parse().ok()) {
        settings.container_bottom_padding = v;
    }
    if let Some(v) = var("APP__DOCUMENT_BOTTOM_PADDING").and_then(|v| v.parse().ok()) {
        settings.document_bottom_padding = v;
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
