//! 应用配置模块

use crate::error::{MirrorError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// 排除规则：这些名称在两侧都不参与比较
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExclusionSets {
    /// 系统/回收站/元数据目录
    #[serde(default = "default_forbidden_directories")]
    pub forbidden_directory_names: BTreeSet<String>,
    /// 系统自动生成的文件
    #[serde(default = "default_forbidden_files")]
    pub forbidden_file_names: BTreeSet<String>,
    /// 仅在扫描根目录时生效
    #[serde(default)]
    pub forbidden_volume_names: BTreeSet<String>,
    /// 某些文件系统用于保存附加元数据的文件名前缀
    #[serde(default = "default_sidecar_prefix")]
    pub sidecar_prefix: String,
}

fn default_forbidden_directories() -> BTreeSet<String> {
    [
        "$RECYCLE.BIN",
        ".fseventsd",
        ".Trashes",
        ".TemporaryItems",
        "System Volume Information",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_forbidden_files() -> BTreeSet<String> {
    ["Thumbs.db", "desktop.ini", ".DS_Store"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_sidecar_prefix() -> String {
    "._".to_string()
}

impl Default for ExclusionSets {
    fn default() -> Self {
        Self {
            forbidden_directory_names: default_forbidden_directories(),
            forbidden_file_names: default_forbidden_files(),
            forbidden_volume_names: BTreeSet::new(),
            sidecar_prefix: default_sidecar_prefix(),
        }
    }
}

impl ExclusionSets {
    /// 不排除任何名称（测试用）
    pub fn none() -> Self {
        Self {
            forbidden_directory_names: BTreeSet::new(),
            forbidden_file_names: BTreeSet::new(),
            forbidden_volume_names: BTreeSet::new(),
            sidecar_prefix: String::new(),
        }
    }

    pub fn is_file_excluded(&self, name: &str) -> bool {
        self.forbidden_file_names.contains(name)
            || (!self.sidecar_prefix.is_empty() && name.starts_with(&self.sidecar_prefix))
    }

    pub fn is_directory_excluded(&self, name: &str) -> bool {
        self.forbidden_directory_names.contains(name)
    }

    /// 卷扫描时同时排除禁用目录和禁用卷名
    pub fn is_volume_excluded(&self, name: &str) -> bool {
        self.forbidden_volume_names.contains(name) || self.is_directory_excluded(name)
    }
}

/// 时间比较配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CompareConfig {
    /// 时间容差（秒），差值小于该值视为相同
    #[serde(default = "default_tolerance_seconds")]
    pub time_tolerance_seconds: i64,
    /// 夏令时偏移（秒），恰好相差该值也视为相同
    #[serde(default = "default_dst_shift_seconds")]
    pub dst_shift_seconds: i64,
}

fn default_tolerance_seconds() -> i64 {
    2
}

fn default_dst_shift_seconds() -> i64 {
    3600
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            time_tolerance_seconds: default_tolerance_seconds(),
            dst_shift_seconds: default_dst_shift_seconds(),
        }
    }
}

/// 镜像配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MirrorConfig {
    /// 扫描卷的根目录
    #[serde(default = "default_root")]
    pub root: PathBuf,
    #[serde(default = "default_source_marker")]
    pub source_marker: String,
    #[serde(default = "default_destination_marker")]
    pub destination_marker: String,
    #[serde(default)]
    pub exclusions: ExclusionSets,
    #[serde(default)]
    pub compare: CompareConfig,
    /// 递归删除目录时路径的最小长度，防止误删根目录
    #[serde(default = "default_min_delete_path_len")]
    pub min_recursive_delete_path_len: usize,
    /// 只输出计划，不修改文件系统
    #[serde(default)]
    pub dry_run: bool,
}

fn default_root() -> PathBuf {
    PathBuf::from("/Volumes")
}

fn default_source_marker() -> String {
    "MAIN".to_string()
}

fn default_destination_marker() -> String {
    "SUBSIDIARY".to_string()
}

fn default_min_delete_path_len() -> usize {
    8
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            source_marker: default_source_marker(),
            destination_marker: default_destination_marker(),
            exclusions: ExclusionSets::default(),
            compare: CompareConfig::default(),
            min_recursive_delete_path_len: default_min_delete_path_len(),
            dry_run: false,
        }
    }
}

impl MirrorConfig {
    /// 从配置目录下的 config.json 加载，文件不存在时使用默认值
    pub fn load(config_dir: &Path) -> Result<Self> {
        Self::load_file(&config_dir.join("config.json"))
    }

    /// 读取配置文件中的 `mirror` 段
    pub fn load_file(config_file: &Path) -> Result<Self> {
        if !config_file.exists() {
            return Ok(Self::default());
        }

        let invalid = |message: String| MirrorError::Config {
            path: config_file.to_path_buf(),
            message,
        };

        let content = fs::read_to_string(config_file).map_err(|e| invalid(e.to_string()))?;
        let config: serde_json::Value =
            serde_json::from_str(&content).map_err(|e| invalid(e.to_string()))?;

        match config.get("mirror") {
            Some(mirror) => {
                serde_json::from_value(mirror.clone()).map_err(|e| invalid(e.to_string()))
            }
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_exclusions() {
        let exclusions = ExclusionSets::default();
        assert!(exclusions.is_directory_excluded("$RECYCLE.BIN"));
        assert!(exclusions.is_directory_excluded("System Volume Information"));
        assert!(exclusions.is_file_excluded(".DS_Store"));
        assert!(exclusions.is_file_excluded("._photo.jpg"));
        assert!(!exclusions.is_file_excluded("photo.jpg"));
        // 大小写敏感
        assert!(!exclusions.is_file_excluded("thumbs.db"));
        // 前缀规则只作用于文件
        assert!(!exclusions.is_directory_excluded("._dir"));
    }

    #[test]
    fn test_volume_exclusion() {
        let mut exclusions = ExclusionSets::default();
        exclusions.forbidden_volume_names.insert("Macintosh HD".to_string());
        assert!(exclusions.is_volume_excluded("Macintosh HD"));
        assert!(exclusions.is_volume_excluded(".Trashes"));
        assert!(!exclusions.is_volume_excluded("Backup"));
        assert!(!exclusions.is_directory_excluded("Macintosh HD"));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = MirrorConfig::load(dir.path()).unwrap();
        assert_eq!(config.source_marker, "MAIN");
        assert_eq!(config.destination_marker, "SUBSIDIARY");
        assert_eq!(config.compare, CompareConfig::default());
        assert_eq!(config.min_recursive_delete_path_len, 8);
        assert!(!config.dry_run);
    }

    #[test]
    fn test_load_partial_section() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("config.json"),
            r#"{"log": {"level": "debug"}, "mirror": {"sourceMarker": "MASTER", "destinationMarker": "SLAVE", "compare": {"timeToleranceSeconds": 5}}}"#,
        )
        .unwrap();

        let config = MirrorConfig::load(dir.path()).unwrap();
        assert_eq!(config.source_marker, "MASTER");
        assert_eq!(config.destination_marker, "SLAVE");
        assert_eq!(config.compare.time_tolerance_seconds, 5);
        assert_eq!(config.compare.dst_shift_seconds, 3600);
        assert_eq!(config.exclusions, ExclusionSets::default());
    }

    #[test]
    fn test_load_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config.json"), "{ not json").unwrap();

        let err = MirrorConfig::load(dir.path()).unwrap_err();
        assert!(matches!(err, MirrorError::Config { .. }));
    }
}
