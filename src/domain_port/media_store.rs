use crate::domain_model::{MediaKind, MediaOwner};
use crate::domain_port::StoreError;
use std::collections::BTreeSet;

/// Sets of media sources the editor reported as removed, kept until the
/// owning content is saved.
#[async_trait::async_trait]
pub trait MediaCandidateStore: Send + Sync {
    async fn add(
        &self,
        kind: MediaKind,
        owner: MediaOwner,
        srcs: &[String],
    ) -> Result<usize, StoreError>;

    async fn remove(
        &self,
        kind: MediaKind,
        owner: MediaOwner,
        srcs: &[String],
    ) -> Result<usize, StoreError>;

    async fn members(&self, kind: MediaKind, owner: MediaOwner)
    -> Result<BTreeSet<String>, StoreError>;

    /// Merges every candidate of `from` into `to` and drops `from`.
    async fn move_all(
        &self,
        kind: MediaKind,
        from: MediaOwner,
        to: MediaOwner,
    ) -> Result<(), StoreError>;

    async fn delete(&self, kind: MediaKind, owner: MediaOwner) -> Result<(), StoreError>;
}

/// Uploaded files addressed by their public source path.
#[async_trait::async_trait]
pub trait MediaFiles: Send + Sync {
    /// Location of `src` relative to the media root, `None` when it is not
    /// served from there.
    fn relative_path<'a>(&self, src: &'a str) -> Option<&'a str>;

    /// Returns false when there was nothing to remove.
    async fn remove_file(&self, src: &str) -> Result<bool, StoreError>;

    async fn remove_dir_if_empty(&self, dir: &str) -> Result<bool, StoreError>;

    async fn remove_dir_all(&self, dir: &str) -> Result<bool, StoreError>;
}
