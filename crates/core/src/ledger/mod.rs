use std::{
    fmt,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::{ClipId, MosError, Result};

/// A rating on the five point MOS scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Score(u8);

impl Score {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(value: u8) -> Result<Self> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(MosError::InvalidScore(value))
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Verbal anchor shown next to each rating.
    pub fn label(self) -> &'static str {
        match self.0 {
            1 => "Bad",
            2 => "Poor",
            3 => "Fair",
            4 => "Good",
            _ => "Excellent",
        }
    }

    /// All scores, lowest first.
    pub fn all() -> impl Iterator<Item = Score> {
        (Self::MIN..=Self::MAX).map(Score)
    }
}

impl TryFrom<u8> for Score {
    type Error = MosError;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Score> for u8 {
    fn from(score: Score) -> Self {
        score.0
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One persisted rating. Field names match the on-disk document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreRecord {
    #[serde(rename = "audio_file")]
    pub clip: ClipId,
    pub score: Score,
}

impl ScoreRecord {
    pub fn new(clip: ClipId, score: Score) -> Self {
        Self { clip, score }
    }
}

/// Append-only list of ratings mirrored to a JSON file.
///
/// Every mutation rewrites the whole document through a temporary file and a
/// rename, so a reader never observes a partial write. The in-memory list is
/// only updated once the write has succeeded, keeping memory and disk in step
/// when persistence fails.
#[derive(Debug)]
pub struct ScoreLedger {
    path: PathBuf,
    records: Vec<ScoreRecord>,
}

impl ScoreLedger {
    /// Opens the ledger at `path`, restoring any prior session.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let records = Self::load(&path);
        Self { path, records }
    }

    /// Reads persisted records. Missing or unreadable files yield an empty
    /// ledger rather than an error.
    pub fn load(path: &Path) -> Vec<ScoreRecord> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Vec::new(),
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "could not read score ledger; starting empty");
                return Vec::new();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(records) => records,
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "score ledger is corrupt; starting empty");
                Vec::new()
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> &[ScoreRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn append(&mut self, record: ScoreRecord) -> Result<()> {
        let mut next = self.records.clone();
        next.push(record);
        self.commit(next)
    }

    /// Removes the most recent record. Returns `None` without touching disk
    /// when the ledger is empty.
    pub fn pop_last(&mut self) -> Result<Option<ScoreRecord>> {
        let Some((last, rest)) = self.records.split_last() else {
            return Ok(None);
        };
        let (last, remaining) = (last.clone(), rest.to_vec());
        self.commit(remaining)?;
        Ok(Some(last))
    }

    /// Drops every record and deletes the persisted file.
    pub fn reset(&mut self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => sync_dir(parent_dir(&self.path))?,
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        self.records.clear();
        Ok(())
    }

    /// Shortens the ledger to `len` records, persisting the result. A no-op
    /// when the ledger is already that short.
    pub fn truncate(&mut self, len: usize) -> Result<()> {
        if len >= self.records.len() {
            return Ok(());
        }
        self.commit(self.records[..len].to_vec())
    }

    fn commit(&mut self, records: Vec<ScoreRecord>) -> Result<()> {
        write_atomic(&self.path, &records)?;
        self.records = records;
        Ok(())
    }
}

fn write_atomic(path: &Path, records: &[ScoreRecord]) -> Result<()> {
    let dir = parent_dir(path);
    std::fs::create_dir_all(dir)?;

    let json = serde_json::to_string_pretty(records)?;
    // the temp file is removed on drop if anything below fails
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(json.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|err| err.error)?;
    sync_dir(dir)?;

    Ok(())
}

fn parent_dir(path: &Path) -> &Path {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

/// Flushes directory entries so a rename or removal survives a crash.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<()> {
    std::fs::File::open(dir)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}
