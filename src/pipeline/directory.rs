//! User directory collaborator driving the refresh sweep.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::Result;
use crate::models::SweepConfig;

/// Source of the groups currently in use.
#[async_trait]
pub trait GroupDirectory: Send + Sync {
    /// Distinct group ids, in a stable order.
    async fn distinct_groups(&self) -> Result<Vec<u32>>;
}

/// Fixed list of groups, typically from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    groups: Vec<u32>,
}

impl StaticDirectory {
    pub fn new(groups: impl IntoIterator<Item = u32>) -> Self {
        Self {
            groups: groups.into_iter().collect(),
        }
    }
}

#[async_trait]
impl GroupDirectory for StaticDirectory {
    async fn distinct_groups(&self) -> Result<Vec<u32>> {
        Ok(dedup(self.groups.iter().copied()))
    }
}

/// One user profile as exported by the account service.
#[derive(Debug, Clone, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub group: Option<u32>,
}

/// JSON array of user profiles, re-read on every sweep.
#[derive(Debug, Clone)]
pub struct UserFileDirectory {
    path: PathBuf,
}

impl UserFileDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl GroupDirectory for UserFileDirectory {
    async fn distinct_groups(&self) -> Result<Vec<u32>> {
        let bytes = tokio::fs::read(&self.path).await?;
        let users: Vec<UserProfile> = serde_json::from_slice(&bytes)?;
        Ok(dedup(users.into_iter().filter_map(|u| u.group)))
    }
}

/// Union of several directories, first occurrence wins the position.
pub struct CombinedDirectory {
    sources: Vec<Box<dyn GroupDirectory>>,
}

impl CombinedDirectory {
    pub fn new(sources: Vec<Box<dyn GroupDirectory>>) -> Self {
        Self { sources }
    }
}

#[async_trait]
impl GroupDirectory for CombinedDirectory {
    async fn distinct_groups(&self) -> Result<Vec<u32>> {
        let mut all = Vec::new();
        for source in &self.sources {
            all.extend(source.distinct_groups().await?);
        }
        Ok(dedup(all))
    }
}

/// Build the directory described by the sweep configuration.
///
/// Configured group ids come first, then groups from the users file.
pub fn from_config(config: &SweepConfig) -> Box<dyn GroupDirectory> {
    let fixed = StaticDirectory::new(config.groups.iter().copied());
    match &config.users_file {
        Some(path) => Box::new(CombinedDirectory::new(vec![
            Box::new(fixed),
            Box::new(UserFileDirectory::new(path)),
        ])),
        None => Box::new(fixed),
    }
}

fn dedup(groups: impl IntoIterator<Item = u32>) -> Vec<u32> {
    let mut seen = std::collections::HashSet::new();
    groups.into_iter().filter(|g| seen.insert(*g)).collect()
}
