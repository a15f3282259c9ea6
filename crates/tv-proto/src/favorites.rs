use std::path::{Path, PathBuf};

use tracing::debug;

use crate::protocol::Channel;

/// Favorites persisted as one JSON array, rewritten in full on every change.
#[derive(Debug, Clone)]
pub struct FavoritesFile {
    path: PathBuf,
}

impl FavoritesFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing or unreadable files yield an empty list.
    pub fn load(&self) -> Vec<Channel> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                debug!("No favorites at {}: {}", self.path.display(), e);
                return Vec::new();
            }
        };
        match serde_json::from_str::<Vec<Channel>>(&content) {
            Ok(favorites) => favorites,
            Err(e) => {
                debug!("Ignoring corrupt favorites file {}: {}", self.path.display(), e);
                Vec::new()
            }
        }
    }

    pub async fn save(&self, favorites: &[Channel]) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(favorites)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}

/// Remove `channel` by identity if present, else append it.
/// Returns `true` when the channel was added.
pub fn toggle(favorites: &mut Vec<Channel>, channel: &Channel) -> bool {
    match favorites.iter().position(|c| c.same_as(channel)) {
        Some(pos) => {
            favorites.remove(pos);
            false
        }
        None => {
            favorites.push(channel.clone());
            true
        }
    }
}
