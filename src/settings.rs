//! Persistent renderer settings

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::pathtracer::{Background, OfflineSettings};
use crate::raster::ShadingParams;
use crate::util::Result;

/// Real-time ray tracing defaults applied when an engine starts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeSettings {
    pub enabled: bool,
    /// 1 (fast) ..= 4 (ultra)
    pub quality: u8,
    pub blend_strength: f32,
    pub progress_overlay: bool,
    pub adaptive_quality: bool,
    pub tile_boundaries: bool,
    pub background: Background,
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            quality: 2,
            blend_strength: 0.7,
            progress_overlay: true,
            adaptive_quality: false,
            tile_boundaries: false,
            background: Background::Black,
        }
    }
}

/// Settings that persist between sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Frame
    pub width: u32,
    pub height: u32,

    // Rasterizer
    pub shading: ShadingParams,
    pub shadows: bool,
    pub flat_backend: bool,
    pub background_image: Option<PathBuf>,

    // Light
    pub light_direction: [f32; 3],

    // Ray tracing
    pub realtime: RealtimeSettings,
    pub offline: OfflineSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            width: 800,
            height: 800,
            shading: ShadingParams::default(),
            shadows: true,
            flat_backend: false,
            background_image: None,
            light_direction: [1.0, 1.0, 1.0],
            realtime: RealtimeSettings::default(),
            offline: OfflineSettings::default(),
        }
    }
}

impl Settings {
    /// Default settings file location
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut p| {
            p.push("softrender");
            p.push("settings.json");
            p
        })
    }

    /// Load from the default location; anything missing or unreadable falls back to defaults
    pub fn load() -> Self {
        match Self::path() {
            Some(p) if p.exists() => Self::load_from(&p).unwrap_or_else(|e| {
                warn!("ignoring settings file {}: {e}", p.display());
                Self::default()
            }),
            _ => Self::default(),
        }
    }

    /// Load from an explicit file
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let mut settings: Self = serde_json::from_str(&text)?;
        settings.sanitize();
        debug!("settings loaded from {}", path.as_ref().display());
        Ok(settings)
    }

    /// Save to the default location
    pub fn save(&self) -> Result<()> {
        match Self::path() {
            Some(p) => self.save_to(p),
            None => Ok(()),
        }
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Pull out-of-range values back into range
    pub fn sanitize(&mut self) {
        self.width = self.width.max(1);
        self.height = self.height.max(1);

        let rt = &mut self.realtime;
        rt.quality = rt.quality.clamp(1, 4);
        rt.blend_strength = if rt.blend_strength.is_nan() {
            RealtimeSettings::default().blend_strength
        } else {
            rt.blend_strength.clamp(0.0, 1.0)
        };

        let off = &mut self.offline;
        off.width = off.width.max(1);
        off.samples_per_pixel = off.samples_per_pixel.max(1);
        if !(off.aspect_ratio.is_finite() && off.aspect_ratio > 0.0) {
            off.aspect_ratio = 1.0;
        }
        if !(off.vfov.is_finite() && off.vfov > 0.0 && off.vfov < 180.0) {
            off.vfov = OfflineSettings::default().vfov;
        }

        self.shading.shadow_floor = self.shading.shadow_floor.clamp(0.0, 1.0);
    }
}
