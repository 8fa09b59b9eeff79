use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{MosError, Result};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub assets: AssetConfig,
    pub ledger: LedgerConfig,
    pub encouragement: EncouragementConfig,
}

impl AppConfig {
    /// Reads a JSON config file. Missing fields fall back to their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.encouragement.messages.is_empty() {
            return Err(MosError::Config(
                "encouragement.messages must contain at least one message".to_string(),
            ));
        }
        if self.assets.audio_extensions.is_empty() {
            return Err(MosError::Config(
                "assets.audio_extensions must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Where clips and encouragement images live and which files count.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    pub audio_dir: PathBuf,
    pub image_dir: PathBuf,
    pub audio_extensions: Vec<String>,
    pub image_extensions: Vec<String>,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            audio_dir: PathBuf::from("audios"),
            image_dir: PathBuf::from("serious_folder"),
            audio_extensions: to_strings(&["mp3", "wav", "ogg"]),
            image_extensions: to_strings(&["jpg", "jpeg", "png", "webp", "gif", "bmp"]),
        }
    }
}

/// Location of the persisted score ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub path: PathBuf,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("mos_scores.json"),
        }
    }
}

/// Message pool and optional seed for the encouragement interstitial.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncouragementConfig {
    pub messages: Vec<String>,
    pub seed: Option<u64>,
}

impl Default for EncouragementConfig {
    fn default() -> Self {
        Self {
            messages: to_strings(crate::encouragement::DEFAULT_MESSAGES),
            seed: None,
        }
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}
