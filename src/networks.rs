use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, error, info};

fn default_port() -> u16 {
    6667
}

/// A saved IRC network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub id: u64,
    pub name: String,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub autojoin: bool,
    #[serde(default)]
    pub has_services: bool,
    #[serde(default)]
    pub nick: Option<String>,
}

impl Network {
    /// A network that is not backed by the saved list
    pub fn new<N: Into<String>, H: Into<String>>(id: u64, name: N, host: H, port: u16) -> Self {
        Network {
            id,
            name: name.into(),
            host: host.into(),
            port,
            autojoin: true,
            has_services: false,
            nick: None,
        }
    }
}

/// The attributes [`NetworkList::edit`] accepts
pub const EDITABLE_ATTRIBUTES: [&str; 6] = ["name", "host", "port", "nick", "has_services", "autojoin"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NetworkEditError {
    #[error("no network with ID {0} exists")]
    NotFound(u64),

    #[error("{0} is not an editable network attribute")]
    InvalidAttribute(String),

    #[error("{value} is not a valid value for {attribute}")]
    InvalidValue { attribute: String, value: String },
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// The list of saved networks
#[derive(Debug, Default)]
pub struct NetworkList {
    networks: RwLock<Vec<Network>>,
    path: Option<PathBuf>,
}

impl NetworkList {
    pub fn from_networks(networks: Vec<Network>) -> Self {
        NetworkList {
            networks: RwLock::new(networks),
            path: None,
        }
    }

    /// Load networks from a JSON file, falling back to `fallback` if the file is missing
    ///
    /// Every change made through the list is written back to the same file.
    pub async fn load<P: AsRef<Path>>(path: P, fallback: Network) -> Result<Self> {
        let path = path.as_ref();

        let networks = if path.exists() {
            let content = fs::read_to_string(path).await?;
            let networks: Vec<Network> = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse networks from {}", path.display()))?;
            info!("Loaded {} networks from {}", networks.len(), path.display());
            networks
        } else {
            debug!("Network file {} doesn't exist yet. Using the configured network.", path.display());
            vec![fallback]
        };

        Ok(NetworkList {
            networks: RwLock::new(networks),
            path: Some(path.to_path_buf()),
        })
    }

    /// All networks, ordered by ID
    pub fn all(&self) -> Vec<Network> {
        let mut networks = self
            .networks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        networks.sort_by_key(|network| network.id);
        networks
    }

    pub fn get(&self, id: u64) -> Option<Network> {
        self.networks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|network| network.id == id)
            .cloned()
    }

    pub fn find_by_host(&self, host: &str) -> Option<Network> {
        self.networks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|network| network.host.eq_ignore_ascii_case(host))
            .cloned()
    }

    /// Set a network's autojoin flag, returning the updated network
    pub fn set_autojoin(&self, id: u64, autojoin: bool) -> Option<Network> {
        let updated = {
            let mut networks = self.networks.write().unwrap_or_else(PoisonError::into_inner);
            let network = networks.iter_mut().find(|network| network.id == id)?;
            network.autojoin = autojoin;
            network.clone()
        };

        self.save();
        Some(updated)
    }

    /// Add a network under the next free ID
    ///
    /// New networks start with autojoin disabled.
    pub fn create(&self, name: &str, host: &str, port: u16) -> Network {
        let network = {
            let mut networks = self.networks.write().unwrap_or_else(PoisonError::into_inner);
            let id = networks.iter().map(|network| network.id).max().unwrap_or(0) + 1;
            let mut network = Network::new(id, name, host, port);
            network.autojoin = false;
            networks.push(network.clone());
            network
        };

        self.save();
        network
    }

    /// Set one of the [`EDITABLE_ATTRIBUTES`] from its text form
    pub fn edit(&self, id: u64, attribute: &str, value: &str) -> Result<Network, NetworkEditError> {
        let invalid = || NetworkEditError::InvalidValue {
            attribute: attribute.to_string(),
            value: value.to_string(),
        };

        let updated = {
            let mut networks = self.networks.write().unwrap_or_else(PoisonError::into_inner);
            let network = networks
                .iter_mut()
                .find(|network| network.id == id)
                .ok_or(NetworkEditError::NotFound(id))?;

            match attribute {
                "name" => network.name = value.to_string(),
                "host" => network.host = value.to_string(),
                "port" => network.port = value.parse().map_err(|_| invalid())?,
                "nick" => network.nick = Some(value.to_string()),
                "has_services" => network.has_services = parse_flag(value).ok_or_else(invalid)?,
                "autojoin" => network.autojoin = parse_flag(value).ok_or_else(invalid)?,
                _ => return Err(NetworkEditError::InvalidAttribute(attribute.to_string())),
            }
            network.clone()
        };

        self.save();
        Ok(updated)
    }

    /// Remove a network, returning it if it existed
    pub fn remove(&self, id: u64) -> Option<Network> {
        let removed = {
            let mut networks = self.networks.write().unwrap_or_else(PoisonError::into_inner);
            let index = networks.iter().position(|network| network.id == id)?;
            networks.remove(index)
        };

        self.save();
        Some(removed)
    }

    fn save(&self) {
        if let Err(e) = self.persist() {
            error!("Failed to save the network list: {}", e);
        }
    }

    // Handlers run on the blocking pool, so a synchronous write is fine here
    fn persist(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let content = serde_json::to_string_pretty(&self.all())?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;

        debug!("Saved the network list to {}", path.display());
        Ok(())
    }
}
