pub mod local;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

pub use local::LocalStorage;

/// 文件元数据
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMeta {
    pub size: u64,
    /// 修改时间（Unix 毫秒）
    pub modified_time: i64,
    pub is_dir: bool,
}

/// 单个目录的直接子项，每次访问时重新获取
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryListing {
    pub files: BTreeMap<String, FileMeta>,
    pub subdirectories: BTreeSet<String>,
}

impl DirectoryListing {
    pub fn has_file(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }

    pub fn has_subdirectory(&self, name: &str) -> bool {
        self.subdirectories.contains(name)
    }
}

/// SystemTime 转换为 Unix 毫秒，早于 1970 的时间为负数
pub fn system_time_to_millis(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_millis() as i64,
        Err(e) => -(e.duration().as_millis() as i64),
    }
}

/// 文件系统访问接口
#[async_trait]
pub trait Storage: Send + Sync {
    /// 列出目录的直接子项；分类不跟随符号链接
    async fn list_dir(&self, path: &Path) -> Result<DirectoryListing>;

    /// 获取元数据，不存在时返回 None
    async fn stat(&self, path: &Path) -> Result<Option<FileMeta>>;

    async fn exists(&self, path: &Path) -> Result<bool> {
        Ok(self.stat(path).await?.is_some())
    }

    async fn is_dir(&self, path: &Path) -> Result<bool> {
        Ok(self.stat(path).await?.map(|m| m.is_dir).unwrap_or(false))
    }

    /// 创建单个目录（父目录必须存在）
    async fn create_dir(&self, path: &Path) -> Result<()>;

    async fn remove_file(&self, path: &Path) -> Result<()>;

    /// 递归删除目录及其全部内容
    async fn remove_dir_all(&self, path: &Path) -> Result<()>;

    /// 复制文件内容，并同步访问时间和修改时间，返回字节数
    async fn copy_file(&self, from: &Path, to: &Path) -> Result<u64>;

    /// 获取存储名称（用于日志）
    fn name(&self) -> &str;
}
