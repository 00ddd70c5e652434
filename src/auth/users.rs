use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tokio::fs;
use tracing::{debug, info};

/// A registered user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub email: String,
    pub nick: String,
    #[serde(default)]
    pub is_admin: bool,
}

/// A user as stored on disk, with their bcrypt password hash
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(flatten)]
    pub user: User,
    pub password: String,
}

/// Key-based user lookups
pub trait UserStore: Send + Sync {
    /// Find a user and their password hash by e-mail (case-insensitive)
    fn find_by_email(&self, email: &str) -> Option<UserRecord>;

    fn find_by_id(&self, id: u64) -> Option<User>;
}

/// Users loaded from a JSON file
#[derive(Debug, Default)]
pub struct UserDirectory {
    by_email: HashMap<String, UserRecord>,
}

impl UserDirectory {
    /// Build a directory from records
    pub fn from_records<I: IntoIterator<Item = UserRecord>>(records: I) -> Self {
        let by_email = records
            .into_iter()
            .map(|record| (record.user.email.to_lowercase(), record))
            .collect();
        UserDirectory { by_email }
    }

    /// Load users from a JSON array of records
    ///
    /// A missing file yields an empty directory.
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            debug!("User file {} doesn't exist yet. Starting with no users.", path.display());
            return Ok(UserDirectory::default());
        }

        let content = fs::read_to_string(path).await?;
        let records: Vec<UserRecord> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse users from {}", path.display()))?;

        info!("Loaded {} users from {}", records.len(), path.display());
        Ok(UserDirectory::from_records(records))
    }

    pub fn len(&self) -> usize {
        self.by_email.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_email.is_empty()
    }
}

impl UserStore for UserDirectory {
    fn find_by_email(&self, email: &str) -> Option<UserRecord> {
        self.by_email.get(&email.to_lowercase()).cloned()
    }

    fn find_by_id(&self, id: u64) -> Option<User> {
        self.by_email
            .values()
            .find(|record| record.user.id == id)
            .map(|record| record.user.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_load_users() -> Result<()> {
        let mut temp_file = NamedTempFile::new()?;
        write!(
            temp_file,
            r#"[
                {{"id": 1, "email": "Admin@Example.com", "nick": "Mako", "password": "$2b$04$hash", "is_admin": true}},
                {{"id": 2, "email": "user@example.com", "nick": "Kiba", "password": "$2b$04$hash"}}
            ]"#
        )?;

        let directory = UserDirectory::load(temp_file.path()).await?;
        assert_eq!(directory.len(), 2);

        // E-mail lookups ignore case
        let admin = directory.find_by_email("admin@example.com").unwrap();
        assert!(admin.user.is_admin);
        assert_eq!(admin.password, "$2b$04$hash");

        let user = directory.find_by_id(2).unwrap();
        assert_eq!(user.nick, "Kiba");
        assert!(!user.is_admin);
        assert!(directory.find_by_id(3).is_none());

        Ok(())
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let directory = UserDirectory::load(dir.path().join("users.json")).await?;
        assert!(directory.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_file_is_an_error() -> Result<()> {
        let mut temp_file = NamedTempFile::new()?;
        write!(temp_file, "not json")?;
        assert!(UserDirectory::load(temp_file.path()).await.is_err());
        Ok(())
    }
}
