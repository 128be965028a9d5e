use crate::config::MirrorConfig;
use crate::core::diff::ActionSummary;
use crate::core::events::MirrorEvent;
use crate::core::reconciler::{ReconcileStats, TreeReconciler};
use crate::core::resolver::VolumeResolver;
use crate::error::Result;
use crate::storage::{LocalStorage, Storage};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// 同步结束状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MirrorStatus {
    Completed,
    /// 已跑完，但有文件或目录处理失败
    CompletedWithErrors,
}

/// 同步报告
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MirrorReport {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub start_time: i64,
    pub end_time: i64,
    pub status: MirrorStatus,
    pub dry_run: bool,
    pub summary: ActionSummary,
    pub bytes_copied: u64,
    /// 耗时（毫秒）
    pub duration: u64,
    pub errors: Vec<String>,
}

impl MirrorReport {
    /// 本次是否修改（或计划修改）了目标
    pub fn changed(&self) -> bool {
        self.summary.mutations() > 0
    }
}

/// 镜像引擎
pub struct MirrorEngine {
    storage: Arc<dyn Storage>,
    config: MirrorConfig,
}

impl MirrorEngine {
    pub fn new(config: MirrorConfig) -> Self {
        Self::with_storage(Arc::new(LocalStorage::new()), config)
    }

    pub fn with_storage(storage: Arc<dyn Storage>, config: MirrorConfig) -> Self {
        Self { storage, config }
    }

    pub fn config(&self) -> &MirrorConfig {
        &self.config
    }

    /// 在配置的根目录下定位源卷和目标卷，然后同步
    ///
    /// 任一卷不存在时直接返回错误，不会修改文件系统。
    pub async fn run(&self, progress_tx: Option<mpsc::Sender<MirrorEvent>>) -> Result<MirrorReport> {
        let root = &self.config.root;
        info!("扫描卷: {} ({})", root.display(), self.storage.name());

        let volumes = VolumeResolver::new(self.storage.as_ref(), &self.config)
            .resolve(root)
            .await?;

        self.mirror(&volumes.source, &volumes.destination, progress_tx)
            .await
    }

    /// 同步两个已知的根目录
    ///
    /// 只处理源根目录下的一级子目录：目标中缺失的先创建，然后逐个同步。
    /// 根目录下的文件和目标中多余的一级目录不做处理。
    pub async fn mirror(
        &self,
        source: &Path,
        destination: &Path,
        progress_tx: Option<mpsc::Sender<MirrorEvent>>,
    ) -> Result<MirrorReport> {
        let start_time = chrono::Utc::now().timestamp();
        let started = Instant::now();
        info!(
            "开始同步: {} -> {}{}",
            source.display(),
            destination.display(),
            if self.config.dry_run { " (演练)" } else { "" }
        );

        let mut reconciler = TreeReconciler::new(self.storage.as_ref(), &self.config);
        if let Some(tx) = progress_tx.as_ref() {
            reconciler = reconciler.with_events(tx);
        }

        let (source_listing, dest_listing) = reconciler.list_pair(source, destination).await?;

        let mut stats = ReconcileStats::default();
        let top_level = reconciler
            .create_subdirectories(&source_listing, &dest_listing, source, destination, &mut stats)
            .await;

        for (source, dest) in top_level {
            info!("同步目录: {}", source.display());
            match reconciler.reconcile(&source, &dest).await {
                Ok(subtree) => stats.merge(subtree),
                Err(e) => reconciler.report_failure(e, &mut stats).await,
            }
        }

        let end_time = chrono::Utc::now().timestamp();
        let status = if stats.failures.is_empty() {
            MirrorStatus::Completed
        } else {
            warn!("同步完成，{} 个错误", stats.failures.len());
            MirrorStatus::CompletedWithErrors
        };

        info!(
            "同步结束: 删除文件 {}, 复制 {}, 更新 {}, 删除目录 {}, 创建目录 {}, {} 字节",
            stats.summary.files_deleted,
            stats.summary.files_copied,
            stats.summary.files_updated,
            stats.summary.dirs_deleted,
            stats.summary.dirs_created,
            stats.bytes_copied
        );

        Ok(MirrorReport {
            source: source.to_path_buf(),
            destination: destination.to_path_buf(),
            start_time,
            end_time,
            status,
            dry_run: self.config.dry_run,
            summary: stats.summary,
            bytes_copied: stats.bytes_copied,
            duration: started.elapsed().as_millis() as u64,
            errors: stats.failures.iter().map(|e| e.to_string()).collect(),
        })
    }
}
