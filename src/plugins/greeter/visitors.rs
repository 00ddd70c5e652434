use anyhow::Result;
use dashmap::DashSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// The nicks that have been seen in the channel before
pub struct VisitorLog {
    known: DashSet<String>,
    path: PathBuf,
}

impl VisitorLog {
    /// Create an empty log persisted to `path`
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        VisitorLog {
            known: DashSet::new(),
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Load known visitors, one nick per line
    ///
    /// A missing file leaves the log empty.
    pub async fn load(&self) -> Result<()> {
        if !self.path.exists() {
            debug!("Known visitors file doesn't exist yet. Starting with empty set.");
            return Ok(());
        }

        let content = fs::read_to_string(&self.path).await?;
        self.known.clear();
        for line in content.lines().map(str::trim).filter(|line| !line.is_empty()) {
            self.known.insert(line.to_lowercase());
        }

        info!("Loaded {} known visitors from {}", self.known.len(), self.path.display());
        Ok(())
    }

    /// Save known visitors, sorted for a stable file
    pub async fn save(&self) -> Result<()> {
        let mut visitors: Vec<String> = self.known.iter().map(|nick| nick.clone()).collect();
        visitors.sort();

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await?;
            }
        }
        fs::write(&self.path, visitors.join("\n")).await?;

        debug!("Saved {} known visitors to {}", visitors.len(), self.path.display());
        Ok(())
    }

    /// Record a visit, returning true if this nick has never been seen before
    pub fn is_first_visit(&self, nick: &str) -> bool {
        self.known.insert(nick.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }
}
