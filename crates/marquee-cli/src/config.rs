//! Layered CLI configuration: an optional TOML file under `MARQUEE_*`
//! environment variables.

use std::{
  io,
  path::{Path, PathBuf},
};

use anyhow::Context as _;
use marquee_core::hall::HallLayout;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct CliConfig {
  /// SQLite database file.
  #[serde(default = "default_store_path")]
  pub store_path:  PathBuf,
  /// Directory holding one `<hall>.txt` seat grid per hall.
  #[serde(default)]
  pub layouts_dir: Option<PathBuf>,
}

fn default_store_path() -> PathBuf { PathBuf::from("cinema.db") }

impl CliConfig {
  /// Read `path` (if it exists) and then the environment, later sources
  /// winning.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("MARQUEE"))
      .build()
      .context("failed to read config file")?;

    let mut cfg: CliConfig = settings
      .try_deserialize()
      .context("failed to deserialise CliConfig")?;
    cfg.store_path = expand_tilde(&cfg.store_path);
    cfg.layouts_dir = cfg.layouts_dir.as_deref().map(expand_tilde);
    Ok(cfg)
  }

  /// The seat grid for `hall`, or `None` when no layout is configured for it.
  pub fn layout(&self, hall: &str) -> anyhow::Result<Option<HallLayout>> {
    let Some(dir) = &self.layouts_dir else {
      return Ok(None);
    };
    let path = dir.join(format!("{hall}.txt"));
    match std::fs::read_to_string(&path) {
      Ok(text) => {
        let layout = HallLayout::parse(hall, &text)
          .with_context(|| format!("invalid hall layout {}", path.display()))?;
        Ok(Some(layout))
      }
      Err(e) if e.kind() == io::ErrorKind::NotFound => {
        tracing::debug!(hall, path = %path.display(), "no layout file for hall");
        Ok(None)
      }
      Err(e) => {
        Err(e).with_context(|| format!("failed to read hall layout {}", path.display()))
      }
    }
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
