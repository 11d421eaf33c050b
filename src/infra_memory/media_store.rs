use crate::domain_model::{MediaKind, MediaOwner, media_relative_path};
use crate::domain_port::*;
use dashmap::{DashMap, DashSet};
use std::collections::BTreeSet;

#[derive(Default)]
pub struct MemoryMediaCandidateStore {
    sets: DashMap<(MediaKind, MediaOwner), BTreeSet<String>>,
}

impl MemoryMediaCandidateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl MediaCandidateStore for MemoryMediaCandidateStore {
    async fn add(
        &self,
        kind: MediaKind,
        owner: MediaOwner,
        srcs: &[String],
    ) -> Result<usize, StoreError> {
        let mut set = self.sets.entry((kind, owner)).or_default();
        Ok(srcs
            .iter()
            .filter(|s| !s.is_empty())
            .filter(|s| set.insert(s.to_string()))
            .count())
    }

    async fn remove(
        &self,
        kind: MediaKind,
        owner: MediaOwner,
        srcs: &[String],
    ) -> Result<usize, StoreError> {
        let removed = match self.sets.get_mut(&(kind, owner)) {
            Some(mut set) => srcs.iter().filter(|s| set.remove(s.as_str())).count(),
            None => 0,
        };
        self.sets.remove_if(&(kind, owner), |_, set| set.is_empty());
        Ok(removed)
    }

    async fn members(
        &self,
        kind: MediaKind,
        owner: MediaOwner,
    ) -> Result<BTreeSet<String>, StoreError> {
        Ok(self
            .sets
            .get(&(kind, owner))
            .map(|set| set.value().clone())
            .unwrap_or_default())
    }

    async fn move_all(
        &self,
        kind: MediaKind,
        from: MediaOwner,
        to: MediaOwner,
    ) -> Result<(), StoreError> {
        if let Some((_, moved)) = self.sets.remove(&(kind, from)) {
            self.sets.entry((kind, to)).or_default().extend(moved);
        }
        Ok(())
    }

    async fn delete(&self, kind: MediaKind, owner: MediaOwner) -> Result<(), StoreError> {
        self.sets.remove(&(kind, owner));
        Ok(())
    }
}

/// Tracks which media paths exist without touching the disk.
pub struct MemoryMediaFiles {
    url_prefix: String,
    files: DashSet<String>,
}

impl MemoryMediaFiles {
    pub fn new(url_prefix: impl Into<String>) -> Self {
        MemoryMediaFiles {
            url_prefix: url_prefix.into().trim_end_matches('/').to_string(),
            files: DashSet::new(),
        }
    }

    pub fn put(&self, src: &str) {
        self.files.insert(src.to_string());
    }

    pub fn exists(&self, src: &str) -> bool {
        self.files.contains(src)
    }

    pub fn in_dir(&self, dir: &str) -> Vec<String> {
        let prefix = format!("{}/{}/", self.url_prefix, dir.trim_matches('/'));
        self.files
            .iter()
            .filter(|f| f.starts_with(&prefix))
            .map(|f| f.key().clone())
            .collect()
    }
}

#[async_trait::async_trait]
impl MediaFiles for MemoryMediaFiles {
    fn relative_path<'a>(&self, src: &'a str) -> Option<&'a str> {
        media_relative_path(src, &self.url_prefix)
    }

    async fn remove_file(&self, src: &str) -> Result<bool, StoreError> {
        Ok(self.files.remove(src).is_some())
    }

    async fn remove_dir_if_empty(&self, dir: &str) -> Result<bool, StoreError> {
        Ok(self.in_dir(dir).is_empty())
    }

    async fn remove_dir_all(&self, dir: &str) -> Result<bool, StoreError> {
        let doomed = self.in_dir(dir);
        for f in &doomed {
            self.files.remove(f);
        }
        Ok(!doomed.is_empty())
    }
}
