pub mod config;
pub mod console;
pub mod core;
pub mod error;
pub mod logging;
pub mod storage;

pub use config::{CompareConfig, ExclusionSets, MirrorConfig};
pub use core::{MirrorEngine, MirrorEvent, MirrorReport, MirrorStatus, SyncAction};
pub use error::{MirrorError, Result};

/// 默认配置目录（config.json 与日志所在位置）
pub fn default_config_dir() -> std::path::PathBuf {
    dirs::config_dir()
        .map(|p| p.join("mirrortools"))
        .unwrap_or_else(|| std::path::PathBuf::from(".mirrortools"))
}
