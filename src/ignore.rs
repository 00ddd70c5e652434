use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, error, info};

use crate::protocol::NickMask;

/// What part of a source an ignore entry matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IgnoreMask {
    Host,
    Nick,
}

impl fmt::Display for IgnoreMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IgnoreMask::Host => f.write_str("host"),
            IgnoreMask::Nick => f.write_str("nick"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnoreEntry {
    pub id: u64,
    pub source: String,
    pub mask: IgnoreMask,
}

impl IgnoreEntry {
    fn matches(&self, source: &NickMask) -> bool {
        match self.mask {
            IgnoreMask::Host => self.source.eq_ignore_ascii_case(&source.host),
            IgnoreMask::Nick => self.source.eq_ignore_ascii_case(&source.nick),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("an ignore entry for the {mask} {value} already exists")]
pub struct AlreadyIgnored {
    pub value: String,
    pub mask: IgnoreMask,
}

/// Hosts and nicks the bot never answers
#[derive(Debug, Default)]
pub struct IgnoreList {
    entries: RwLock<Vec<IgnoreEntry>>,
    path: Option<PathBuf>,
}

impl IgnoreList {
    /// Load the list from a JSON file; a missing file is an empty list
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let entries = if path.exists() {
            let content = fs::read_to_string(path).await?;
            let entries: Vec<IgnoreEntry> = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse the ignore list from {}", path.display()))?;
            info!("Loaded {} ignore list entries from {}", entries.len(), path.display());
            entries
        } else {
            debug!("Ignore list {} doesn't exist yet", path.display());
            Vec::new()
        };

        Ok(IgnoreList {
            entries: RwLock::new(entries),
            path: Some(path.to_path_buf()),
        })
    }

    /// Whether messages from `source` should be ignored
    pub fn exists(&self, source: &NickMask) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|entry| entry.matches(source))
    }

    /// All entries, ordered by ID
    pub fn all(&self) -> Vec<IgnoreEntry> {
        let mut entries = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        entries.sort_by_key(|entry| entry.id);
        entries
    }

    pub fn add(&self, source: &str, mask: IgnoreMask) -> Result<IgnoreEntry, AlreadyIgnored> {
        let entry = {
            let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
            if entries
                .iter()
                .any(|entry| entry.mask == mask && entry.source.eq_ignore_ascii_case(source))
            {
                return Err(AlreadyIgnored {
                    value: source.to_string(),
                    mask,
                });
            }

            let id = entries.iter().map(|entry| entry.id).max().unwrap_or(0) + 1;
            let entry = IgnoreEntry {
                id,
                source: source.to_string(),
                mask,
            };
            entries.push(entry.clone());
            entry
        };

        self.save();
        Ok(entry)
    }

    pub fn delete_by_id(&self, id: u64) -> Option<IgnoreEntry> {
        let removed = {
            let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
            let index = entries.iter().position(|entry| entry.id == id)?;
            entries.remove(index)
        };

        self.save();
        Some(removed)
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.save();
    }

    fn save(&self) {
        if let Err(e) = self.persist() {
            error!("Failed to save the ignore list: {}", e);
        }
    }

    // The list is small and only changes on admin commands
    fn persist(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let content = serde_json::to_string_pretty(&self.all())?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;

        debug!("Saved the ignore list to {}", path.display());
        Ok(())
    }
}
