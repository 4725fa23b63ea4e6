//! 临时写入与原子替换：上传与重命名都经由此处落盘。

use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::storage::StorageError;

/// 与目标文件同目录的临时文件，完成后原子替换目标。
pub struct AtomicFile {
    target: PathBuf,
    temp_path: PathBuf,
    file: File,
}

impl AtomicFile {
    /// 在目标路径同目录创建临时文件。
    pub async fn new(target: &Path) -> Result<Self, StorageError> {
        let parent = target.parent().ok_or(StorageError::InvalidPath)?;
        let base = target
            .file_name()
            .map(|name| name.to_string_lossy())
            .ok_or(StorageError::InvalidPath)?;
        let temp_name = format!(".{base}.tmp.{}", Uuid::new_v4());
        let temp_path = parent.join(temp_name);
        let file = File::create(&temp_path).await?;
        Ok(Self {
            target: target.to_path_buf(),
            temp_path,
            file,
        })
    }

    pub async fn write_all(&mut self, contents: &[u8]) -> Result<(), StorageError> {
        self.file.write_all(contents).await?;
        Ok(())
    }

    /// 放弃并清理临时文件。
    pub async fn cleanup(self) {
        drop(self.file);
        let _ = fs::remove_file(&self.temp_path).await;
    }

    /// 同步并原子替换目标文件。
    pub async fn finalize(self) -> Result<(), StorageError> {
        self.file.sync_all().await?;
        drop(self.file);

        if let Err(err) = fs::rename(&self.temp_path, &self.target).await {
            #[cfg(windows)]
            {
                if fs::remove_file(&self.target).await.is_ok() {
                    fs::rename(&self.temp_path, &self.target).await?;
                    return Ok(());
                }
            }
            let _ = fs::remove_file(&self.temp_path).await;
            return Err(StorageError::Io(err));
        }

        if let Some(parent) = self.target.parent() {
            let _ = sync_dir(parent).await;
        }

        Ok(())
    }
}

#[cfg(unix)]
async fn sync_dir(path: &Path) -> io::Result<()> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let dir = std::fs::File::open(path)?;
        dir.sync_all()
    })
    .await
    .map_err(|err| io::Error::other(err.to_string()))?
}

#[cfg(not(unix))]
async fn sync_dir(_path: &Path) -> io::Result<()> {
    Ok(())
}
