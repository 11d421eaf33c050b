use crate::domain_model::media_relative_path;
use crate::domain_port::*;
use crate::logger::*;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

/// Uploaded media under `root`, published at `url_prefix`. A source like
/// `/media/images/3/a.png` maps to `<root>/images/3/a.png`.
pub struct LocalMediaFiles {
    root: PathBuf,
    url_prefix: String,
}

fn io_error(path: &Path, e: std::io::Error) -> StoreError {
    StoreError::Store(format!("{}: {e}", path.display()))
}

impl LocalMediaFiles {
    pub fn new(root: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Self {
        LocalMediaFiles {
            root: root.into(),
            url_prefix: url_prefix.into().trim_end_matches('/').to_string(),
        }
    }

    /// Only plain relative segments are accepted, so nothing escapes `root`.
    fn resolve(&self, relative: &str) -> Option<PathBuf> {
        let relative = Path::new(relative.trim_start_matches('/'));
        if relative.as_os_str().is_empty()
            || !relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)))
        {
            return None;
        }
        Some(self.root.join(relative))
    }

    /// `None` for external URLs and anything outside the media prefix.
    fn path_for_src(&self, src: &str) -> Option<PathBuf> {
        self.resolve(self.relative_path(src)?)
    }
}

#[async_trait::async_trait]
impl MediaFiles for LocalMediaFiles {
    fn relative_path<'a>(&self, src: &'a str) -> Option<&'a str> {
        media_relative_path(src, &self.url_prefix)
    }

    async fn remove_file(&self, src: &str) -> Result<bool, StoreError> {
        let Some(path) = self.path_for_src(src) else {
            debug!(src, "not a local media source");
            return Ok(false);
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error(&path, e)),
        }
    }

    async fn remove_dir_if_empty(&self, dir: &str) -> Result<bool, StoreError> {
        let Some(path) = self.resolve(dir) else {
            return Ok(false);
        };
        let mut entries = match tokio::fs::read_dir(&path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(io_error(&path, e)),
        };
        if entries
            .next_entry()
            .await
            .map_err(|e| io_error(&path, e))?
            .is_some()
        {
            return Ok(false);
        }
        tokio::fs::remove_dir(&path)
            .await
            .map_err(|e| io_error(&path, e))?;
        Ok(true)
    }

    async fn remove_dir_all(&self, dir: &str) -> Result<bool, StoreError> {
        let Some(path) = self.resolve(dir) else {
            return Ok(false);
        };
        match tokio::fs::remove_dir_all(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error(&path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("quillpress-{name}-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(dir.join("images/7")).unwrap();
        dir
    }

    #[test]
    fn sources_outside_the_prefix_are_ignored() {
        let files = LocalMediaFiles::new("/srv/media", "/media/");
        assert_eq!(
            files.path_for_src("/media/images/7/a.png"),
            Some(PathBuf::from("/srv/media/images/7/a.png"))
        );
        assert_eq!(files.path_for_src("https://cdn.example.com/a.png"), None);
        assert_eq!(files.path_for_src("/media/../etc/passwd"), None);
        assert_eq!(files.path_for_src("/mediax/a.png"), None);
        assert_eq!(files.resolve("images/../../x"), None);
    }

    #[tokio::test]
    async fn removes_files_and_empty_dirs() {
        let root = scratch("files");
        std::fs::write(root.join("images/7/a.png"), b"png").unwrap();
        let files = LocalMediaFiles::new(&root, "/media");

        assert!(!files.remove_dir_if_empty("images/7").await.unwrap());
        assert!(files.remove_file("/media/images/7/a.png").await.unwrap());
        assert!(!files.remove_file("/media/images/7/a.png").await.unwrap());
        assert!(files.remove_dir_if_empty("images/7").await.unwrap());
        assert!(!root.join("images/7").exists());

        std::fs::remove_dir_all(&root).unwrap();
    }

    #[tokio::test]
    async fn removes_whole_user_dirs() {
        let root = scratch("dirs");
        std::fs::write(root.join("images/7/a.png"), b"png").unwrap();
        let files = LocalMediaFiles::new(&root, "/media");

        assert!(files.remove_dir_all("images/7").await.unwrap());
        assert!(!files.remove_dir_all("images/7").await.unwrap());

        std::fs::remove_dir_all(&root).unwrap();
    }
}
