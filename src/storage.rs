use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;
use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs;

use crate::atomic::AtomicFile;

/// Directory id that addresses the storage root in `/list`.
pub const ROOT_ID: &str = "root";

#[derive(Clone, Debug)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub async fn ensure_root(&self) -> io::Result<()> {
        fs::create_dir_all(&self.root).await
    }

    pub fn root_path(&self) -> &Path {
        &self.root
    }

    /// Joins a caller supplied path onto the root.
    ///
    /// Any value containing `..` is rejected outright. The check is a plain
    /// substring match: nothing is canonicalized and symlinks are followed.
    /// Leading separators are dropped so `/a.txt` stays inside the root.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, StorageError> {
        if relative.contains("..") {
            return Err(StorageError::InvalidPath);
        }
        let trimmed = relative.trim_start_matches(['/', '\\']);
        Ok(self.root.join(trimmed))
    }

    pub async fn list_names(&self, id: &str) -> Result<Vec<String>, StorageError> {
        let target = if id == ROOT_ID || id.is_empty() {
            self.root.clone()
        } else {
            self.resolve(id)?
        };
        let mut dir = fs::read_dir(&target).await?;
        let mut names = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        names.sort();
        Ok(names)
    }

    pub async fn metadata(
        &self,
        relative: &str,
    ) -> Result<Vec<(&'static str, String)>, StorageError> {
        let target = self.resolve(relative)?;
        let metadata = fs::metadata(&target).await?;
        Ok(describe(&metadata))
    }

    pub async fn read(&self, relative: &str) -> Result<Vec<u8>, StorageError> {
        let target = self.resolve(relative)?;
        Ok(fs::read(target).await?)
    }

    /// Reads a file as text, replacing invalid UTF-8 sequences.
    pub async fn read_text(&self, relative: &str) -> Result<String, StorageError> {
        let bytes = self.read(relative).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub async fn write(&self, relative: &str, contents: &[u8]) -> Result<(), StorageError> {
        let target = self.resolve(relative)?;
        write_atomic(&target, contents).await
    }

    pub async fn delete(&self, relative: &str) -> Result<(), StorageError> {
        let target = self.resolve(relative)?;
        fs::remove_file(target).await?;
        Ok(())
    }

    /// Copies `from` to `to`, then removes `from`.
    pub async fn rename(&self, from: &str, to: &str) -> Result<(), StorageError> {
        let source = self.resolve(from)?;
        let target = self.resolve(to)?;
        let contents = fs::read(&source).await?;
        write_atomic(&target, &contents).await?;
        fs::remove_file(source).await?;
        Ok(())
    }
}

async fn write_atomic(target: &Path, contents: &[u8]) -> Result<(), StorageError> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).await?;
    }
    let mut atomic = AtomicFile::new(target).await?;
    if let Err(err) = atomic.write_all(contents).await {
        atomic.cleanup().await;
        return Err(err);
    }
    atomic.finalize().await
}

/// Flattens filesystem metadata into ordered `key: value` pairs.
fn describe(metadata: &Metadata) -> Vec<(&'static str, String)> {
    let mut fields = Vec::new();

    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        fields.push(("dev", metadata.dev().to_string()));
        fields.push(("ino", metadata.ino().to_string()));
        fields.push(("mode", metadata.mode().to_string()));
        fields.push(("nlink", metadata.nlink().to_string()));
        fields.push(("uid", metadata.uid().to_string()));
        fields.push(("gid", metadata.gid().to_string()));
        fields.push(("rdev", metadata.rdev().to_string()));
        fields.push(("size", metadata.size().to_string()));
        fields.push(("blksize", metadata.blksize().to_string()));
        fields.push(("blocks", metadata.blocks().to_string()));
    }

    #[cfg(not(unix))]
    {
        fields.push(("size", metadata.len().to_string()));
        fields.push(("isFile", metadata.is_file().to_string()));
        fields.push(("isDirectory", metadata.is_dir().to_string()));
        fields.push(("isSymbolicLink", metadata.is_symlink().to_string()));
    }

    let times = [
        ("atimeMs", "atime", metadata.accessed().ok()),
        ("mtimeMs", "mtime", metadata.modified().ok()),
        ("ctimeMs", "ctime", changed_time(metadata)),
        ("birthtimeMs", "birthtime", metadata.created().ok()),
    ];
    for (millis_key, _, time) in &times {
        if let Some(millis) = time.and_then(epoch_millis) {
            fields.push((*millis_key, millis.to_string()));
        }
    }
    for (_, date_key, time) in &times {
        if let Some(time) = time {
            fields.push((*date_key, format_timestamp(*time)));
        }
    }

    fields
}

#[cfg(unix)]
fn changed_time(metadata: &Metadata) -> Option<SystemTime> {
    use std::os::unix::fs::MetadataExt;
    let secs = u64::try_from(metadata.ctime()).ok()?;
    let nanos = u32::try_from(metadata.ctime_nsec()).ok()?;
    UNIX_EPOCH.checked_add(std::time::Duration::new(secs, nanos))
}

#[cfg(not(unix))]
fn changed_time(metadata: &Metadata) -> Option<SystemTime> {
    metadata.modified().ok()
}

fn epoch_millis(time: SystemTime) -> Option<u128> {
    time.duration_since(UNIX_EPOCH).ok().map(|d| d.as_millis())
}

fn format_timestamp(time: SystemTime) -> String {
    let datetime: DateTime<Utc> = time.into();
    datetime.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug)]
pub enum StorageError {
    InvalidPath,
    Io(io::Error),
}

impl From<io::Error> for StorageError {
    fn from(err: io::Error) -> Self {
        StorageError::Io(err)
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::InvalidPath => f.write_str("Invalid path"),
            StorageError::Io(err) => write!(f, "{err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Storage, StorageError};
    use tempfile::tempdir;

    fn make_storage() -> (tempfile::TempDir, Storage) {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("drive");
        std::fs::create_dir_all(&root).expect("create root");
        (temp, Storage::new(root))
    }

    #[test]
    fn resolve_rejects_parent_segments() {
        let (_temp, storage) = make_storage();
        for path in ["..", "../secret.txt", "a/../../b", "..\\x"] {
            assert!(
                matches!(storage.resolve(path), Err(StorageError::InvalidPath)),
                "{path} should be rejected"
            );
        }
    }

    // The guard is a substring match, so names that merely contain `..`
    // are refused as well.
    #[test]
    fn resolve_rejects_double_dot_inside_names() {
        let (_temp, storage) = make_storage();
        assert!(matches!(
            storage.resolve("notes..txt"),
            Err(StorageError::InvalidPath)
        ));
    }

    #[test]
    fn resolve_keeps_leading_slash_inside_root() {
        let (_temp, storage) = make_storage();
        let resolved = storage.resolve("/uploaded.txt").expect("resolve");
        assert_eq!(resolved, storage.root_path().join("uploaded.txt"));
    }

    #[tokio::test]
    async fn write_then_read_returns_same_bytes() {
        let (_temp, storage) = make_storage();
        let bytes = [0u8, 159, 146, 150, 10, 255];
        storage.write("blob.bin", &bytes).await.expect("write");
        assert_eq!(storage.read("blob.bin").await.expect("read"), bytes);
    }

    #[tokio::test]
    async fn write_creates_parent_directories() {
        let (_temp, storage) = make_storage();
        storage.write("nested/dir/a.txt", b"a").await.expect("write");
        let names = storage.list_names("nested").await.expect("list");
        assert_eq!(names, vec!["dir".to_string()]);
    }

    #[tokio::test]
    async fn list_root_of_empty_store_is_empty() {
        let (_temp, storage) = make_storage();
        assert!(storage.list_names("root").await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn delete_missing_file_fails_every_time() {
        let (_temp, storage) = make_storage();
        assert!(matches!(
            storage.delete("ghost.txt").await,
            Err(StorageError::Io(_))
        ));
        assert!(matches!(
            storage.delete("ghost.txt").await,
            Err(StorageError::Io(_))
        ));
    }

    #[tokio::test]
    async fn rename_moves_content() {
        let (_temp, storage) = make_storage();
        storage.write("a.txt", b"original").await.expect("write");
        storage.rename("a.txt", "/b.txt").await.expect("rename");

        assert!(!storage.root_path().join("a.txt").exists());
        assert_eq!(storage.read("b.txt").await.expect("read"), b"original");
    }

    #[tokio::test]
    async fn rename_rejects_traversal_target() {
        let (_temp, storage) = make_storage();
        storage.write("a.txt", b"keep").await.expect("write");
        assert!(matches!(
            storage.rename("a.txt", "../escape.txt").await,
            Err(StorageError::InvalidPath)
        ));
        assert_eq!(storage.read("a.txt").await.expect("read"), b"keep");
    }

    #[tokio::test]
    async fn metadata_reports_size() {
        let (_temp, storage) = make_storage();
        storage.write("five.txt", b"hello").await.expect("write");
        let fields = storage.metadata("five.txt").await.expect("metadata");
        assert!(fields.contains(&("size", "5".to_string())));
        assert!(fields.iter().any(|(key, _)| *key == "mtime"));
    }
}
