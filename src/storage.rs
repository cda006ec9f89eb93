use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Ordering;
use std::fs::Metadata;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};
use tokio::fs;
use tokio::io::ErrorKind;

/// Storage root plus the path rules every request goes through.
#[derive(Clone, Debug)]
pub struct Storage {
    root: PathBuf,
    max_path_len: usize,
}

impl Storage {
    pub fn new(root: PathBuf, max_path_len: usize) -> Self {
        Self { root, max_path_len }
    }

    pub fn root_path(&self) -> &Path {
        &self.root
    }

    /// Resolves a request path such as `/docs/a.txt` beneath the root.
    ///
    /// Every existing component is checked so that a symlink cannot lead
    /// outside the root. A component that is missing, or a regular file used
    /// as a directory, means the target does not exist: that is
    /// `Io(NotFound)`, or `Ok` when `allow_missing` is set (uploads, whose
    /// create step then fails on its own).
    pub async fn resolve_path_checked(
        &self,
        requested: &str,
        allow_missing: bool,
    ) -> Result<PathBuf, StorageError> {
        let target = self.resolve(requested)?;
        self.ensure_no_symlink_components(&target, allow_missing)
            .await?;
        Ok(target)
    }

    fn resolve(&self, requested: &str) -> Result<PathBuf, StorageError> {
        let mut normalized = PathBuf::new();
        let trimmed = requested.trim_start_matches(['/', '\\']);
        for component in Path::new(trimmed).components() {
            match component {
                Component::Normal(segment) => normalized.push(segment),
                Component::CurDir => continue,
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(StorageError::InvalidPath);
                }
            }
        }

        let target = self.root.join(normalized);
        if target.as_os_str().len() > self.max_path_len {
            return Err(StorageError::PathTooLong {
                limit: self.max_path_len,
            });
        }
        Ok(target)
    }

    async fn ensure_no_symlink_components(
        &self,
        target: &Path,
        allow_missing: bool,
    ) -> Result<(), StorageError> {
        let relative = target
            .strip_prefix(&self.root)
            .map_err(|_| StorageError::InvalidPath)?;
        let mut current = PathBuf::from(&self.root);
        let mut components = relative.components().peekable();

        while let Some(component) = components.next() {
            current.push(component.as_os_str());
            match fs::symlink_metadata(&current).await {
                Ok(metadata) => {
                    if metadata.file_type().is_symlink() {
                        return Err(StorageError::InvalidPath);
                    }
                    if components.peek().is_some() && !metadata.is_dir() {
                        // Nothing exists beneath a regular file.
                        return absent(allow_missing, ErrorKind::NotFound.into());
                    }
                }
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    return absent(allow_missing, err);
                }
                Err(err) => return Err(StorageError::Io(err)),
            }
        }

        Ok(())
    }

    /// Metadata of an already resolved target, `None` when nothing is there.
    pub async fn probe(&self, target: &Path) -> Result<Option<Metadata>, StorageError> {
        match fs::symlink_metadata(target).await {
            Ok(metadata) => Ok(Some(metadata)),
            Err(err) if matches!(err.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {
                Ok(None)
            }
            Err(err) => Err(StorageError::Io(err)),
        }
    }

    pub async fn list_dir(&self, requested: Option<&str>) -> Result<Vec<FileEntry>, StorageError> {
        let target = self
            .resolve_path_checked(requested.unwrap_or("/"), false)
            .await?;
        let mut dir = fs::read_dir(&target).await?;
        let mut entries = Vec::new();

        while let Some(entry) = dir.next_entry().await? {
            let metadata = entry.metadata().await?;
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().to_string();
            let relative_path = path
                .strip_prefix(&self.root)
                .map_err(|_| StorageError::InvalidPath)?
                .to_string_lossy()
                .replace(std::path::MAIN_SEPARATOR, "/");
            let modified = metadata
                .modified()
                .ok()
                .and_then(|ts| ts.duration_since(UNIX_EPOCH).ok())
                .map(format_timestamp);

            entries.push(FileEntry {
                name,
                path: format!("/{relative_path}"),
                is_dir: metadata.is_dir(),
                size: metadata.len(),
                modified,
            });
        }

        entries.sort_by(|a, b| match (a.is_dir, b.is_dir) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        });

        Ok(entries)
    }
}

fn absent(allow_missing: bool, err: io::Error) -> Result<(), StorageError> {
    if allow_missing {
        Ok(())
    } else {
        Err(StorageError::Io(err))
    }
}

fn format_timestamp(duration: Duration) -> String {
    let timestamp = UNIX_EPOCH + duration;
    let datetime: DateTime<Utc> = timestamp.into();
    datetime.format("%Y-%m-%d %H:%M:%S").to_string()
}

#[derive(Debug)]
pub enum StorageError {
    InvalidPath,
    PathTooLong { limit: usize },
    Io(io::Error),
}

impl From<io::Error> for StorageError {
    fn from(err: io::Error) -> Self {
        StorageError::Io(err)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub name: String,
    pub path: String,
    pub is_dir: bool,
    pub size: u64,
    pub modified: Option<String>,
}
