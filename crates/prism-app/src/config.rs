// SPDX-License-Identifier: CEPL-1.0
//! Startup configuration: `prism.toml` plus command-line overrides.
//! Read once; nothing here is watched for changes.

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;
use tracing::{info, warn};

pub const DEFAULT_CONFIG_PATH: &str = "prism.toml";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Config file to read before applying the flags below
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Present through the XR runtime instead of a window
    #[arg(long, overrides_with = "no_xr")]
    pub xr: bool,

    /// Force window presentation even if the config enables XR
    #[arg(long, overrides_with = "xr")]
    pub no_xr: bool,

    /// Use the XR_KHR_vulkan_enable negotiation path
    #[arg(long)]
    pub legacy_xr: bool,

    /// Enable the Khronos validation layer
    #[arg(long)]
    pub validation: bool,

    #[arg(long)]
    pub width: Option<u32>,

    #[arg(long)]
    pub height: Option<u32>,

    #[arg(long, value_name = "BOOL", action = clap::ArgAction::Set)]
    pub vsync: Option<bool>,

    #[arg(long)]
    pub frames_in_flight: Option<usize>,
}

impl Args {
    /// Flags win over the file. Absent flags leave the file value alone.
    pub fn apply(&self, cfg: &mut AppCfg) {
        if self.xr {
            cfg.xr.enabled = true;
        }
        if self.no_xr {
            cfg.xr.enabled = false;
        }
        if self.legacy_xr {
            cfg.xr.legacy_binding = true;
        }
        if self.validation {
            cfg.gpu.validation = true;
        }
        if let Some(w) = self.width {
            cfg.window.width = w;
        }
        if let Some(h) = self.height {
            cfg.window.height = h;
        }
        if let Some(v) = self.vsync {
            cfg.window.vsync = v;
        }
        if let Some(n) = self.frames_in_flight {
            cfg.gpu.frames_in_flight = n;
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct WindowCfg {
    pub width: u32,
    pub height: u32,
    pub vsync: bool,
}

impl Default for WindowCfg {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            vsync: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(default)]
pub struct XrCfg {
    pub enabled: bool,
    pub legacy_binding: bool,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct GpuCfg {
    pub validation: bool,
    pub frames_in_flight: usize,
    pub wait_queue_idle: bool,
}

impl Default for GpuCfg {
    fn default() -> Self {
        Self {
            validation: cfg!(debug_assertions),
            frames_in_flight: 2,
            wait_queue_idle: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(default)]
pub struct AppCfg {
    pub window: WindowCfg,
    pub xr: XrCfg,
    pub gpu: GpuCfg,
}

impl AppCfg {
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

/// A missing or malformed file is not fatal; the run continues on defaults.
pub fn load_cfg(path: &Path) -> AppCfg {
    let text = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            warn!("config {} not readable ({e}), using defaults", path.display());
            return AppCfg::default();
        }
    };
    match AppCfg::parse(&text) {
        Ok(cfg) => {
            info!("loaded config from {}", path.display());
            cfg
        }
        Err(e) => {
            warn!("config {} is invalid, using defaults: {e}", path.display());
            AppCfg::default()
        }
    }
}

/// File first, then flags.
pub fn resolve(args: &Args) -> AppCfg {
    let mut cfg = load_cfg(&args.config);
    args.apply(&mut cfg);
    cfg
}
