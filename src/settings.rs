use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::overlay::{FitParams, OverlayParams};

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

#[derive(Debug, Clone)]
pub struct Settings {
    pub default_language: Option<String>,
    pub min_font_size: f32,
    pub horizontal_padding: f32,
    pub line_height_factor: f32,
    pub popover_flip_threshold: f32,
    pub popover_offset_px: f32,
    pub fill_color: String,
    pub text_color: String,
    pub font_path: Option<String>,
    pub font_family: Option<String>,
    pub file_suffix: String,
    pub degenerate_cutoff_px: f32,
    pub max_upload_mb: u64,
}

impl Default for Settings {
    fn default() -> Self {
        let fit = FitParams::default();
        let overlay = OverlayParams::default();
        Self {
            default_language: None,
            min_font_size: fit.min_font_size,
            horizontal_padding: fit.horizontal_padding,
            line_height_factor: fit.line_height_factor,
            popover_flip_threshold: overlay.popover_flip_threshold,
            popover_offset_px: overlay.popover_offset_px,
            fill_color: "#ffffff".to_string(),
            text_color: "#111111".to_string(),
            font_path: None,
            font_family: None,
            file_suffix: "_translated".to_string(),
            degenerate_cutoff_px: 1.0,
            max_upload_mb: 32,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    system: Option<SystemSettings>,
    fit: Option<FitSettings>,
    overlay: Option<OverlaySettings>,
    export: Option<ExportSettings>,
    server: Option<ServerSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct SystemSettings {
    default_language: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FitSettings {
    min_font_size: Option<f32>,
    horizontal_padding: Option<f32>,
    line_height_factor: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct OverlaySettings {
    popover_flip_threshold: Option<f32>,
    popover_offset_px: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct ExportSettings {
    fill_color: Option<String>,
    text_color: Option<String>,
    font_path: Option<String>,
    font_family: Option<String>,
    file_suffix: Option<String>,
    degenerate_cutoff_px: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerSettings {
    max_upload_mb: Option<u64>,
}

pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let home = home_dir();
    if let Some(home) = home.as_deref() {
        ensure_home_settings_file(home)?;
    }
    load_settings_from(home.as_deref(), extra_path)
}

/// Merges `settings.toml` and `settings.local.toml` from the working
/// directory, then from `home`, then the explicit file. Later files win.
pub fn load_settings_from(home: Option<&Path>, extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();

    let mut ordered_paths = vec![
        PathBuf::from("settings.toml"),
        PathBuf::from("settings.local.toml"),
    ];
    if let Some(home) = home {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }
    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            settings.merge_str(&content).with_context(|| {
                format!("failed to parse settings: {}", path.display())
            })?;
        }
    }

    Ok(settings)
}

impl Settings {
    pub fn fit_params(&self) -> FitParams {
        FitParams {
            min_font_size: self.min_font_size,
            horizontal_padding: self.horizontal_padding,
            line_height_factor: self.line_height_factor,
        }
    }

    pub fn overlay_params(&self) -> OverlayParams {
        OverlayParams {
            popover_flip_threshold: self.popover_flip_threshold,
            popover_offset_px: self.popover_offset_px,
        }
    }

    /// Request body limit for the web endpoints. Uploads travel as base64
    /// inside JSON, so this covers about three quarters as much raw file.
    pub fn max_upload_bytes(&self) -> usize {
        usize::try_from(self.max_upload_mb.saturating_mul(1024 * 1024)).unwrap_or(usize::MAX)
    }

    fn merge_str(&mut self, content: &str) -> Result<()> {
        let parsed: SettingsFile = toml::from_str(content)?;
        self.merge(parsed);
        Ok(())
    }

    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(system) = incoming.system
            && let Some(lang) = system.default_language
            && !lang.trim().is_empty()
        {
            self.default_language = Some(lang.trim().to_string());
        }
        if let Some(fit) = incoming.fit {
            merge_positive(&mut self.min_font_size, fit.min_font_size);
            if let Some(padding) = fit.horizontal_padding
                && padding >= 0.0
            {
                self.horizontal_padding = padding;
            }
            merge_positive(&mut self.line_height_factor, fit.line_height_factor);
        }
        if let Some(overlay) = incoming.overlay {
            if let Some(threshold) = overlay.popover_flip_threshold
                && (0.0..=100.0).contains(&threshold)
            {
                self.popover_flip_threshold = threshold;
            }
            if let Some(offset) = overlay.popover_offset_px
                && offset >= 0.0
            {
                self.popover_offset_px = offset;
            }
        }
        if let Some(export) = incoming.export {
            merge_non_empty(&mut self.fill_color, export.fill_color);
            merge_non_empty(&mut self.text_color, export.text_color);
            merge_non_empty(&mut self.file_suffix, export.file_suffix);
            if let Some(path) = export.font_path
                && !path.trim().is_empty()
            {
                self.font_path = Some(path);
            }
            if let Some(family) = export.font_family
                && !family.trim().is_empty()
            {
                self.font_family = Some(family);
            }
            merge_positive(&mut self.degenerate_cutoff_px, export.degenerate_cutoff_px);
        }
        if let Some(server) = incoming.server
            && let Some(limit) = server.max_upload_mb
            && limit > 0
        {
            self.max_upload_mb = limit;
        }
    }
}

fn merge_positive(target: &mut f32, value: Option<f32>) {
    if let Some(value) = value
        && value > 0.0
    {
        *target = value;
    }
}

fn merge_non_empty(target: &mut String, value: Option<String>) {
    if let Some(value) = value
        && !value.trim().is_empty()
    {
        *target = value;
    }
}

fn ensure_home_settings_file(home: &Path) -> Result<()> {
    fs::create_dir_all(home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".image-translator-rust"))
        }
    })
}
