use crate::config::{ExclusionSets, MirrorConfig};
use crate::core::comparator::TimestampComparator;
use crate::core::diff::{ActionKind, ActionSummary, DiffPlanner, SyncAction};
use crate::core::events::MirrorEvent;
use crate::error::{MirrorError, Result};
use crate::storage::{DirectoryListing, Storage};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// 一次同步的统计
#[derive(Debug, Default)]
pub struct ReconcileStats {
    pub summary: ActionSummary,
    pub bytes_copied: u64,
    pub failures: Vec<MirrorError>,
}

impl ReconcileStats {
    pub fn merge(&mut self, other: ReconcileStats) {
        let s = &mut self.summary;
        let o = other.summary;
        s.files_deleted += o.files_deleted;
        s.files_copied += o.files_copied;
        s.files_updated += o.files_updated;
        s.dirs_deleted += o.dirs_deleted;
        s.dirs_created += o.dirs_created;
        s.dirs_visited += o.dirs_visited;
        self.bytes_copied += other.bytes_copied;
        self.failures.extend(other.failures);
    }
}

/// 目录树同步器：让目标目录与源目录保持一致
pub struct TreeReconciler<'a> {
    storage: &'a dyn Storage,
    exclusions: &'a ExclusionSets,
    comparator: TimestampComparator,
    min_recursive_delete_path_len: usize,
    dry_run: bool,
    events: Option<&'a mpsc::Sender<MirrorEvent>>,
}

impl<'a> TreeReconciler<'a> {
    pub fn new(storage: &'a dyn Storage, config: &'a MirrorConfig) -> Self {
        Self {
            storage,
            exclusions: &config.exclusions,
            comparator: TimestampComparator::new(&config.compare),
            min_recursive_delete_path_len: config.min_recursive_delete_path_len,
            dry_run: config.dry_run,
            events: None,
        }
    }

    pub fn with_events(mut self, events: &'a mpsc::Sender<MirrorEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn planner(&self) -> DiffPlanner<'_> {
        DiffPlanner::new(self.exclusions, &self.comparator)
    }

    /// 同步 `dest_dir` 使其与 `source_dir` 一致
    ///
    /// 两个根目录无法读取时返回错误；树内部的失败记录在统计里，
    /// 只放弃出错的那一层目录，兄弟目录继续同步。
    pub async fn reconcile(&self, source_dir: &Path, dest_dir: &Path) -> Result<ReconcileStats> {
        let mut stats = ReconcileStats::default();

        self.list_pair(source_dir, dest_dir).await?;

        // 显式栈代替递归；子目录逆序入栈以保证按名称深度优先
        let mut pending = vec![(source_dir.to_path_buf(), dest_dir.to_path_buf())];

        while let Some((source, dest)) = pending.pop() {
            stats.summary.record(ActionKind::Recurse);
            match self.reconcile_directory(&source, &dest, &mut stats).await {
                Ok(children) => pending.extend(children.into_iter().rev()),
                Err(e) => self.report_failure(e, &mut stats).await,
            }
        }

        Ok(stats)
    }

    /// 处理单层目录，返回需要继续进入的子目录
    async fn reconcile_directory(
        &self,
        source_dir: &Path,
        dest_dir: &Path,
        stats: &mut ReconcileStats,
    ) -> Result<Vec<(PathBuf, PathBuf)>> {
        let planner = self.planner();
        let before = (stats.summary.mutations(), stats.failures.len());

        let (source, dest) = self.list_pair(source_dir, dest_dir).await?;
        for action in planner.plan_file_deletions(&source, &dest, dest_dir) {
            self.apply(&action, stats).await?;
        }

        let (source, dest) = self.list_pair(source_dir, dest_dir).await?;
        for action in planner.plan_file_transfers(&source, &dest, source_dir, dest_dir) {
            self.apply(&action, stats).await?;
        }

        let (source, dest) = self.list_pair(source_dir, dest_dir).await?;
        let dir_deletions = planner.plan_directory_deletions(&source, &dest, dest_dir);
        let freed_names = !dir_deletions.is_empty();
        for action in dir_deletions {
            self.apply(&action, stats).await?;
        }

        // 被目录占用的文件名在目录删除后补做复制
        if freed_names {
            let (source, dest) = self.list_pair(source_dir, dest_dir).await?;
            for action in planner.plan_file_transfers(&source, &dest, source_dir, dest_dir) {
                self.apply(&action, stats).await?;
            }
        }

        let (source, dest) = self.list_pair(source_dir, dest_dir).await?;
        let children = self
            .create_subdirectories(&source, &dest, source_dir, dest_dir, stats)
            .await;

        if (stats.summary.mutations(), stats.failures.len()) == before {
            self.emit(MirrorEvent::DirectoryUnchanged {
                path: dest_dir.to_path_buf(),
            })
            .await;
        }

        Ok(children)
    }

    /// 创建缺失的子目录，返回需要进入的目录对
    ///
    /// 创建失败只跳过该子目录，兄弟目录照常返回。
    pub(crate) async fn create_subdirectories(
        &self,
        source: &DirectoryListing,
        dest: &DirectoryListing,
        source_dir: &Path,
        dest_dir: &Path,
        stats: &mut ReconcileStats,
    ) -> Vec<(PathBuf, PathBuf)> {
        let mut children = Vec::new();
        let mut failed_create: Option<PathBuf> = None;

        for action in self
            .planner()
            .plan_directory_creations(source, dest, source_dir, dest_dir)
        {
            match action {
                SyncAction::Recurse { source, dest } => {
                    if failed_create.as_deref() != Some(dest.as_path()) {
                        children.push((source, dest));
                    }
                }
                other => {
                    if let Err(e) = self.apply(&other, stats).await {
                        failed_create = Some(other.target().to_path_buf());
                        self.report_failure(e, stats).await;
                    }
                }
            }
        }

        children
    }

    /// 执行单个动作；复制失败只记录，其他失败向上返回
    pub(crate) async fn apply(&self, action: &SyncAction, stats: &mut ReconcileStats) -> Result<()> {
        let kind = action.kind();
        if !kind.is_mutating() {
            return Ok(());
        }

        if !self.dry_run {
            match action {
                SyncAction::DeleteFile { path } => self
                    .storage
                    .remove_file(path)
                    .await
                    .map_err(|e| MirrorError::filesystem("delete file", path, e))?,
                SyncAction::CopyFile { source, dest } | SyncAction::UpdateFile { source, dest } => {
                    match self.storage.copy_file(source, dest).await {
                        Ok(bytes) => stats.bytes_copied += bytes,
                        Err(e) => {
                            let failure = MirrorError::CopyFailure {
                                source_path: source.clone(),
                                destination: dest.clone(),
                                message: e.to_string(),
                            };
                            self.report_failure(failure, stats).await;
                            return Ok(());
                        }
                    }
                }
                SyncAction::DeleteDirectory { path } => {
                    if path.as_os_str().len() < self.min_recursive_delete_path_len {
                        return Err(MirrorError::filesystem(
                            "delete dir",
                            path,
                            "refusing to recursively delete a short path",
                        ));
                    }
                    self.storage
                        .remove_dir_all(path)
                        .await
                        .map_err(|e| MirrorError::filesystem("delete dir", path, e))?
                }
                SyncAction::CreateDirectory { path } => self
                    .storage
                    .create_dir(path)
                    .await
                    .map_err(|e| MirrorError::filesystem("create dir", path, e))?,
                SyncAction::Recurse { .. } => {}
            }
        }

        debug!("{}\t{}", kind, action.target().display());
        stats.summary.record(kind);
        self.emit(MirrorEvent::Action {
            kind,
            path: action.target().to_path_buf(),
            dry_run: self.dry_run,
        })
        .await;

        Ok(())
    }

    pub(crate) async fn list_pair(
        &self,
        source_dir: &Path,
        dest_dir: &Path,
    ) -> Result<(DirectoryListing, DirectoryListing)> {
        let source = self
            .storage
            .list_dir(source_dir)
            .await
            .map_err(|e| MirrorError::filesystem("list", source_dir, e))?;
        let dest = self.list_dest(dest_dir).await?;
        Ok((source, dest))
    }

    async fn list_dest(&self, dest_dir: &Path) -> Result<DirectoryListing> {
        // 演练模式下目标目录可能尚未创建
        if self.dry_run {
            let is_dir = self
                .storage
                .stat(dest_dir)
                .await
                .map_err(|e| MirrorError::filesystem("stat", dest_dir, e))?
                .map(|m| m.is_dir)
                .unwrap_or(false);
            if !is_dir {
                return Ok(DirectoryListing::default());
            }
        }

        self.storage
            .list_dir(dest_dir)
            .await
            .map_err(|e| MirrorError::filesystem("list", dest_dir, e))
    }

    pub(crate) async fn report_failure(&self, failure: MirrorError, stats: &mut ReconcileStats) {
        warn!("{}", failure);
        self.emit(MirrorEvent::Failure {
            path: failure.path().map(Path::to_path_buf).unwrap_or_default(),
            message: failure.to_string(),
        })
        .await;
        stats.failures.push(failure);
    }

    async fn emit(&self, event: MirrorEvent) {
        if let Some(tx) = self.events {
            let _ = tx.send(event).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalStorage;
    use std::fs;

    fn config() -> MirrorConfig {
        MirrorConfig {
            min_recursive_delete_path_len: 0,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_copies_nested_tree() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        fs::create_dir_all(src.path().join("a/b")).unwrap();
        fs::write(src.path().join("a/b/file.txt"), b"data").unwrap();
        fs::write(src.path().join("top.txt"), b"top").unwrap();

        let storage = LocalStorage::new();
        let config = config();
        let stats = TreeReconciler::new(&storage, &config)
            .reconcile(src.path(), dst.path())
            .await
            .unwrap();

        assert_eq!(fs::read(dst.path().join("a/b/file.txt")).unwrap(), b"data");
        assert_eq!(fs::read(dst.path().join("top.txt")).unwrap(), b"top");
        assert_eq!(stats.summary.files_copied, 2);
        assert_eq!(stats.summary.dirs_created, 2);
        assert_eq!(stats.bytes_copied, 7);
        assert!(stats.failures.is_empty());
    }

    #[tokio::test]
    async fn test_missing_root_is_fatal() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new();
        let config = config();

        let result = TreeReconciler::new(&storage, &config)
            .reconcile(&src.path().join("missing"), dst.path())
            .await;
        assert!(matches!(result, Err(MirrorError::Filesystem { .. })));
    }

    #[tokio::test]
    async fn test_short_path_guard() {
        let storage = LocalStorage::new();
        let config = MirrorConfig {
            min_recursive_delete_path_len: 8,
            ..Default::default()
        };
        let reconciler = TreeReconciler::new(&storage, &config);
        let mut stats = ReconcileStats::default();

        let err = reconciler
            .apply(
                &SyncAction::DeleteDirectory {
                    path: PathBuf::from("/tmp"),
                },
                &mut stats,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MirrorError::Filesystem { .. }));
        assert_eq!(stats.summary.dirs_deleted, 0);
    }

    #[tokio::test]
    async fn test_failed_create_skips_only_that_subdirectory() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        fs::create_dir_all(src.path().join("a/Thumbs.db")).unwrap();
        fs::create_dir_all(src.path().join("a/zeta")).unwrap();
        fs::write(src.path().join("a/zeta/keep.txt"), b"keep").unwrap();
        // 被排除的文件名占住了目录位置，不会被删除
        fs::create_dir(dst.path().join("a")).unwrap();
        fs::write(dst.path().join("a/Thumbs.db"), b"thumbs").unwrap();

        let storage = LocalStorage::new();
        let config = config();
        let stats = TreeReconciler::new(&storage, &config)
            .reconcile(src.path(), dst.path())
            .await
            .unwrap();

        assert_eq!(stats.failures.len(), 1);
        assert!(matches!(
            &stats.failures[0],
            MirrorError::Filesystem { operation: "create dir", .. }
        ));
        assert_eq!(fs::read(dst.path().join("a/Thumbs.db")).unwrap(), b"thumbs");
        assert_eq!(fs::read(dst.path().join("a/zeta/keep.txt")).unwrap(), b"keep");
    }

    #[tokio::test]
    async fn test_events_are_emitted() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        fs::write(src.path().join("new.txt"), b"x").unwrap();
        fs::write(dst.path().join("old.txt"), b"y").unwrap();

        let storage = LocalStorage::new();
        let config = config();
        let (tx, mut rx) = mpsc::channel(16);
        TreeReconciler::new(&storage, &config)
            .with_events(&tx)
            .reconcile(src.path(), dst.path())
            .await
            .unwrap();
        drop(tx);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert_eq!(
            events,
            vec![
                MirrorEvent::Action {
                    kind: ActionKind::DeleteFile,
                    path: dst.path().join("old.txt"),
                    dry_run: false,
                },
                MirrorEvent::Action {
                    kind: ActionKind::CopyFile,
                    path: dst.path().join("new.txt"),
                    dry_run: false,
                },
            ]
        );
    }
}
