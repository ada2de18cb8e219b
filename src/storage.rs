//! Originals and thumbnails on local disk, served under `/uploads`.

use std::path::{Component, Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::{StorageError, StorageResult};

pub const PUBLIC_PREFIX: &str = "/uploads";

const THUMBNAIL_DIR: &str = "thumbnails";

/// Public paths of one stored upload
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredImage {
    pub original_path: String,
    pub thumbnail_path: String,
}

#[derive(Clone, Debug)]
pub struct ImageStore {
    root: PathBuf,
}

impl ImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the upload and thumbnail directories if missing
    pub async fn bootstrap(&self) -> StorageResult<()> {
        fs::create_dir_all(self.root.join(THUMBNAIL_DIR)).await?;
        debug!("Upload directory ready at {}", self.root.display());
        Ok(())
    }

    /// Write an original and its thumbnail under fresh names
    pub async fn save(
        &self,
        original_filename: &str,
        original: &[u8],
        thumbnail: &[u8],
    ) -> StorageResult<StoredImage> {
        let id = Uuid::new_v4();
        let original_name = match extension_of(original_filename) {
            Some(ext) => format!("{}.{}", id, ext),
            None => id.to_string(),
        };
        let thumbnail_name = format!("{}/thumb_{}.jpg", THUMBNAIL_DIR, id);

        fs::write(self.root.join(&original_name), original).await?;
        if let Err(err) = fs::write(self.root.join(&thumbnail_name), thumbnail).await {
            // Don't leave a half-stored upload behind
            let _ = fs::remove_file(self.root.join(&original_name)).await;
            return Err(err.into());
        }

        Ok(StoredImage {
            original_path: format!("{}/{}", PUBLIC_PREFIX, original_name),
            thumbnail_path: format!("{}/{}", PUBLIC_PREFIX, thumbnail_name),
        })
    }

    pub async fn read(&self, public_path: &str) -> StorageResult<Vec<u8>> {
        let path = self.resolve(public_path)?;
        Ok(fs::read(path).await?)
    }

    /// Delete a stored file; a file that is already gone is not an error
    pub async fn remove(&self, public_path: &str) -> StorageResult<()> {
        let path = self.resolve(public_path)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!("{} was already removed", path.display());
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Best-effort removal of both files of an image
    pub async fn remove_quietly(&self, stored: &StoredImage) {
        for path in [&stored.original_path, &stored.thumbnail_path] {
            if let Err(err) = self.remove(path).await {
                warn!("Failed to remove {}: {}", path, err);
            }
        }
    }

    /// Map a public `/uploads/...` path onto the upload directory
    pub fn resolve(&self, public_path: &str) -> StorageResult<PathBuf> {
        let relative = public_path
            .strip_prefix(PUBLIC_PREFIX)
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(|| StorageError::InvalidPath(public_path.to_string()))?;

        let relative = Path::new(relative);
        let is_plain = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        if relative.as_os_str().is_empty() || !is_plain {
            return Err(StorageError::InvalidPath(public_path.to_string()));
        }

        Ok(self.root.join(relative))
    }
}

/// Lowercased extension of a client filename, if it looks like one
fn extension_of(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    let valid = !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric());
    valid.then_some(ext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn store() -> (TempDir, ImageStore) {
        let dir = TempDir::new().unwrap();
        let store = ImageStore::new(dir.path().join("uploads"));
        store.bootstrap().await.unwrap();
        (dir, store)
    }

    #[test]
    fn test_extension_sanitising() {
        assert_eq!(extension_of("photo.JPG"), Some("jpg".to_string()));
        assert_eq!(extension_of("archive.tar.gz"), Some("gz".to_string()));
        assert_eq!(extension_of("noext"), None);
        assert_eq!(extension_of("weird.j/pg"), None);
        assert_eq!(extension_of("long.extension"), None);
        assert_eq!(extension_of("trailing."), None);
    }

    #[tokio::test]
    async fn test_save_read_and_remove() {
        let (_dir, store) = store().await;

        let stored = store.save("Beach.PNG", b"original", b"thumb").await.unwrap();
        assert!(stored.original_path.starts_with("/uploads/"));
        assert!(stored.original_path.ends_with(".png"));
        assert!(stored.thumbnail_path.starts_with("/uploads/thumbnails/thumb_"));
        assert!(stored.thumbnail_path.ends_with(".jpg"));

        assert_eq!(store.read(&stored.original_path).await.unwrap(), b"original");
        assert_eq!(store.read(&stored.thumbnail_path).await.unwrap(), b"thumb");

        store.remove(&stored.original_path).await.unwrap();
        assert!(store.read(&stored.original_path).await.is_err());

        // Removing twice is fine
        store.remove(&stored.original_path).await.unwrap();
    }

    #[tokio::test]
    async fn test_each_upload_gets_a_fresh_name() {
        let (_dir, store) = store().await;
        let first = store.save("a.jpg", b"1", b"1").await.unwrap();
        let second = store.save("a.jpg", b"2", b"2").await.unwrap();
        assert_ne!(first.original_path, second.original_path);
    }

    #[test]
    fn test_paths_outside_uploads_are_rejected() {
        let store = ImageStore::new("/srv/uploads");

        for path in [
            "/uploads/../secret.txt",
            "/uploads/thumbnails/../../etc/passwd",
            "/etc/passwd",
            "/uploadsevil/x.jpg",
            "/uploads/",
            "uploads/x.jpg",
        ] {
            assert!(
                matches!(store.resolve(path), Err(StorageError::InvalidPath(_))),
                "{} should be rejected",
                path
            );
        }

        assert_eq!(
            store.resolve("/uploads/thumbnails/thumb_x.jpg").unwrap(),
            PathBuf::from("/srv/uploads/thumbnails/thumb_x.jpg")
        );
    }
}
