//! 错误类型

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, MirrorError>;

#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    /// 根目录下没有找到带源标记文件的卷
    #[error("{marker} does not exist (searched {root})")]
    SourceNotFound { marker: String, root: PathBuf },

    /// 根目录下没有找到带目标标记文件的卷
    #[error("{marker} does not exist (searched {root})")]
    DestinationNotFound { marker: String, root: PathBuf },

    /// 单个文件复制失败，不中断整个同步
    #[error("copy {source_path} -> {destination} failed: {message}")]
    CopyFailure {
        source_path: PathBuf,
        destination: PathBuf,
        message: String,
    },

    /// 列目录、创建、删除等文件系统操作失败
    #[error("{operation} {path} failed: {message}")]
    Filesystem {
        operation: &'static str,
        path: PathBuf,
        message: String,
    },

    #[error("invalid config {path}: {message}")]
    Config { path: PathBuf, message: String },
}

impl MirrorError {
    pub(crate) fn filesystem(
        operation: &'static str,
        path: impl Into<PathBuf>,
        err: impl std::fmt::Display,
    ) -> Self {
        MirrorError::Filesystem {
            operation,
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// 未找到的卷标记名
    pub fn missing_marker(&self) -> Option<&str> {
        match self {
            MirrorError::SourceNotFound { marker, .. }
            | MirrorError::DestinationNotFound { marker, .. } => Some(marker),
            _ => None,
        }
    }

    /// 出错的路径，用于控制台输出
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            MirrorError::SourceNotFound { root, .. }
            | MirrorError::DestinationNotFound { root, .. } => Some(root),
            MirrorError::CopyFailure { destination, .. } => Some(destination),
            MirrorError::Filesystem { path, .. } => Some(path),
            MirrorError::Config { path, .. } => Some(path),
        }
    }
}
