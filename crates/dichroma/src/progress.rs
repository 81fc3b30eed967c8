//! # Level Unlock Progress
//!
//! The one piece of persistence this engine owns: which levels the player
//! has unlocked. A tiny TOML file, loaded once, rewritten on every unlock.
//! I/O failures degrade to in-memory state with a warning; losing a save
//! write must never take the game down.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ProgressError;

#[derive(Debug, Default, Serialize, Deserialize)]
struct ProgressFile {
    unlocked: Vec<u32>,
}

/// The unlock store.
#[derive(Debug, Default)]
pub struct ProgressStore {
    path: Option<PathBuf>,
    unlocked: BTreeSet<u32>,
}

impl ProgressStore {
    /// First level, always unlocked.
    pub const FIRST_LEVEL: u32 = 1;

    /// An in-memory store (no persistence). Used by tests and tools.
    #[must_use]
    pub fn in_memory() -> Self {
        let mut store = Self::default();
        store.unlocked.insert(Self::FIRST_LEVEL);
        store
    }

    /// Loads the store from `path`. A missing file starts fresh; a corrupt
    /// file is logged and starts fresh (the alternative is refusing to
    /// boot over a save file).
    #[must_use]
    pub fn load(path: &Path) -> Self {
        let mut store = Self::in_memory();
        store.path = Some(path.to_path_buf());

        match Self::read_file(path) {
            Ok(Some(file)) => {
                store.unlocked.extend(file.unlocked);
            }
            Ok(None) => {}
            Err(err) => {
                tracing::warn!("progress store unreadable ({err}); starting fresh");
            }
        }
        store
    }

    fn read_file(path: &Path) -> Result<Option<ProgressFile>, ProgressError> {
        if !path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(path)?;
        Ok(Some(toml::from_str(&text)?))
    }

    /// True if `level` is unlocked.
    #[must_use]
    pub fn is_unlocked(&self, level: u32) -> bool {
        self.unlocked.contains(&level)
    }

    /// Highest unlocked level.
    #[must_use]
    pub fn highest_unlocked(&self) -> u32 {
        self.unlocked.iter().next_back().copied().unwrap_or(Self::FIRST_LEVEL)
    }

    /// Unlocks `level` and persists. Persistence failure is logged, not
    /// returned: the unlock stays effective in memory.
    pub fn unlock(&mut self, level: u32) {
        if !self.unlocked.insert(level) {
            return;
        }
        tracing::info!("level {} unlocked", level);
        if let Err(err) = self.save() {
            tracing::warn!("failed to persist progress: {err}");
        }
    }

    /// Writes the store to its backing file, if it has one.
    pub fn save(&self) -> Result<(), ProgressError> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };
        let file = ProgressFile {
            unlocked: self.unlocked.iter().copied().collect(),
        };
        let text = toml::to_string(&file)?;
        std::fs::write(path, text)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_level_always_unlocked() {
        let store = ProgressStore::in_memory();
        assert!(store.is_unlocked(ProgressStore::FIRST_LEVEL));
        assert!(!store.is_unlocked(2));
        assert_eq!(store.highest_unlocked(), 1);
    }

    #[test]
    fn test_unlock_and_highest() {
        let mut store = ProgressStore::in_memory();
        store.unlock(3);
        store.unlock(2);
        assert!(store.is_unlocked(2));
        assert!(store.is_unlocked(3));
        assert_eq!(store.highest_unlocked(), 3);
    }

    #[test]
    fn test_roundtrip_through_file() {
        let dir = std::env::temp_dir().join("dichroma_progress_test");
        std::fs::create_dir_all(&dir).expect("temp dir");
        let path = dir.join("progress.toml");
        let _ = std::fs::remove_file(&path);

        {
            let mut store = ProgressStore::load(&path);
            store.unlock(2);
            store.unlock(5);
        }

        let reloaded = ProgressStore::load(&path);
        assert!(reloaded.is_unlocked(1));
        assert!(reloaded.is_unlocked(2));
        assert!(reloaded.is_unlocked(5));
        assert!(!reloaded.is_unlocked(4));
        assert_eq!(reloaded.highest_unlocked(), 5);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_corrupt_file_starts_fresh() {
        let dir = std::env::temp_dir().join("dichroma_progress_test");
        std::fs::create_dir_all(&dir).expect("temp dir");
        let path = dir.join("corrupt.toml");
        std::fs::write(&path, "unlocked = \"not a list").expect("write");

        let store = ProgressStore::load(&path);
        assert!(store.is_unlocked(ProgressStore::FIRST_LEVEL));
        assert_eq!(store.highest_unlocked(), 1);

        let _ = std::fs::remove_file(&path);
    }
}
