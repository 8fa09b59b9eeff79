use std::{
    fmt,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{config::AssetConfig, Result};

/// Stable identifier of an audio clip: the clip's storage path as handed to the
/// audio player. Serialised as a plain string in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClipId(String);

impl ClipId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }

    /// File name component, used for display.
    pub fn file_name(&self) -> &str {
        self.as_path()
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(&self.0)
    }
}

impl fmt::Display for ClipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Path to an encouragement image.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageRef(PathBuf);

impl ImageRef {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

/// Read-only listing of the clips under test and the encouragement images.
///
/// Clips are ordered lexicographically by file name and that order is fixed
/// for the lifetime of the catalog.
#[derive(Debug, Clone, Default)]
pub struct AssetCatalog {
    clips: Vec<ClipId>,
    images: Vec<ImageRef>,
}

impl AssetCatalog {
    /// Scans the configured directories. A missing directory yields an empty
    /// listing; any other IO failure is returned.
    pub fn load(config: &AssetConfig) -> Result<Self> {
        let clips = scan_dir(&config.audio_dir, &config.audio_extensions)?
            .into_iter()
            .filter_map(|path| match path.into_os_string().into_string() {
                Ok(id) => Some(ClipId::new(id)),
                Err(raw) => {
                    tracing::warn!(clip = ?raw, "skipping clip with a non UTF-8 path");
                    None
                }
            })
            .collect();
        let images = scan_dir(&config.image_dir, &config.image_extensions)?
            .into_iter()
            .map(ImageRef::new)
            .collect();

        Ok(Self { clips, images })
    }

    pub fn list_clips(&self) -> &[ClipId] {
        &self.clips
    }

    pub fn list_images(&self) -> &[ImageRef] {
        &self.images
    }
}

fn scan_dir(dir: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            tracing::warn!(dir = %dir.display(), "asset directory does not exist");
            return Ok(Vec::new());
        }
        Err(err) => return Err(err.into()),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        if has_allowed_extension(&name.to_string_lossy(), extensions) {
            names.push(name);
        }
    }
    names.sort();

    Ok(names.into_iter().map(|name| dir.join(name)).collect())
}

/// Case-insensitive suffix match against extensions given with or without the
/// leading dot.
fn has_allowed_extension(name: &str, extensions: &[String]) -> bool {
    let lower = name.to_lowercase();
    extensions.iter().any(|ext| {
        let ext = ext.trim_start_matches('.').to_lowercase();
        lower.ends_with(&format!(".{ext}"))
    })
}
