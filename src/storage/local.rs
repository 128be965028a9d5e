use super::{system_time_to_millis, DirectoryListing, FileMeta, Storage};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use filetime::FileTime;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::warn;
use walkdir::WalkDir;

/// 本地文件系统
pub struct LocalStorage {
    name: String,
}

impl LocalStorage {
    pub fn new() -> Self {
        Self {
            name: "local".to_string(),
        }
    }

    fn meta_from(metadata: &std::fs::Metadata) -> FileMeta {
        let modified = metadata
            .modified()
            .map(system_time_to_millis)
            .unwrap_or_default();

        FileMeta {
            size: if metadata.is_dir() { 0 } else { metadata.len() },
            modified_time: modified,
            is_dir: metadata.is_dir(),
        }
    }

    fn list_blocking(path: PathBuf) -> Result<DirectoryListing> {
        // 目录本身允许是符号链接（例如用户传入的根目录），子项分类不跟随
        let metadata = std::fs::metadata(&path)?;
        if !metadata.is_dir() {
            return Err(anyhow!("not a directory: {}", path.display()));
        }

        let mut listing = DirectoryListing::default();

        for entry in WalkDir::new(&path)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false)
            .sort_by_file_name()
        {
            let entry = entry?;
            let Some(name) = entry.file_name().to_str() else {
                warn!("跳过非 UTF-8 文件名: {}", entry.path().display());
                continue;
            };

            if entry.file_type().is_dir() {
                listing.subdirectories.insert(name.to_string());
            } else {
                // 符号链接按指向的文件比较，悬空链接保留自身元数据
                let metadata = if entry.file_type().is_symlink() {
                    match std::fs::metadata(entry.path()) {
                        Ok(target) => target,
                        Err(_) => entry.metadata()?,
                    }
                } else {
                    entry.metadata()?
                };
                let meta = FileMeta {
                    is_dir: false,
                    ..Self::meta_from(&metadata)
                };
                listing.files.insert(name.to_string(), meta);
            }
        }

        Ok(listing)
    }
}

impl Default for LocalStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn list_dir(&self, path: &Path) -> Result<DirectoryListing> {
        let path = path.to_path_buf();
        // 使用 spawn_blocking 避免阻塞 async runtime
        tokio::task::spawn_blocking(move || Self::list_blocking(path)).await?
    }

    async fn stat(&self, path: &Path) -> Result<Option<FileMeta>> {
        match fs::symlink_metadata(path).await {
            Ok(metadata) => Ok(Some(Self::meta_from(&metadata))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn create_dir(&self, path: &Path) -> Result<()> {
        fs::create_dir(path).await?;
        Ok(())
    }

    async fn remove_file(&self, path: &Path) -> Result<()> {
        fs::remove_file(path).await?;
        Ok(())
    }

    async fn remove_dir_all(&self, path: &Path) -> Result<()> {
        fs::remove_dir_all(path).await?;
        Ok(())
    }

    async fn copy_file(&self, from: &Path, to: &Path) -> Result<u64> {
        // 目标是符号链接时先删除，避免写穿到链接指向的文件
        if let Ok(existing) = fs::symlink_metadata(to).await {
            if existing.file_type().is_symlink() {
                fs::remove_file(to).await?;
            }
        }

        let bytes = fs::copy(from, to).await?;

        // 时间取自实际读取的内容，与列表中的比较口径一致
        let source_meta = fs::metadata(from).await?;
        let accessed = FileTime::from_last_access_time(&source_meta);
        let modified = FileTime::from_last_modification_time(&source_meta);
        let target = to.to_path_buf();
        tokio::task::spawn_blocking(move || {
            filetime::set_symlink_file_times(&target, accessed, modified)
        })
        .await??;

        Ok(bytes)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
