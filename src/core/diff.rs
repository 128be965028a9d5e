//! 目录差异计算
//!
//! 只比较两个目录清单并给出动作，不访问文件系统。每个目录按固定阶段处理：
//! 删除多余文件、复制/更新文件、删除多余目录、创建目录并递归。

use crate::config::ExclusionSets;
use crate::core::comparator::TimestampComparator;
use crate::storage::DirectoryListing;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// 同步动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
    /// 目标有、源没有的文件
    DeleteFile { path: PathBuf },
    /// 源有、目标没有的文件
    CopyFile { source: PathBuf, dest: PathBuf },
    /// 两边都有但修改时间不同
    UpdateFile { source: PathBuf, dest: PathBuf },
    /// 目标有、源没有的目录（递归删除）
    DeleteDirectory { path: PathBuf },
    /// 源有、目标没有的目录
    CreateDirectory { path: PathBuf },
    /// 进入匹配的子目录继续同步
    Recurse { source: PathBuf, dest: PathBuf },
}

/// 动作类型，用于输出和统计
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    DeleteFile,
    CopyFile,
    UpdateFile,
    DeleteDirectory,
    CreateDirectory,
    Recurse,
}

impl ActionKind {
    /// 控制台输出使用的标签
    pub fn label(&self) -> &'static str {
        match self {
            ActionKind::DeleteFile => "delete file",
            ActionKind::CopyFile => "copy file",
            ActionKind::UpdateFile => "update file",
            ActionKind::DeleteDirectory => "delete dir",
            ActionKind::CreateDirectory => "create dir",
            ActionKind::Recurse => "recurse",
        }
    }

    pub fn is_mutating(&self) -> bool {
        !matches!(self, ActionKind::Recurse)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl SyncAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            SyncAction::DeleteFile { .. } => ActionKind::DeleteFile,
            SyncAction::CopyFile { .. } => ActionKind::CopyFile,
            SyncAction::UpdateFile { .. } => ActionKind::UpdateFile,
            SyncAction::DeleteDirectory { .. } => ActionKind::DeleteDirectory,
            SyncAction::CreateDirectory { .. } => ActionKind::CreateDirectory,
            SyncAction::Recurse { .. } => ActionKind::Recurse,
        }
    }

    /// 受影响的目标路径
    pub fn target(&self) -> &Path {
        match self {
            SyncAction::DeleteFile { path }
            | SyncAction::DeleteDirectory { path }
            | SyncAction::CreateDirectory { path } => path,
            SyncAction::CopyFile { dest, .. }
            | SyncAction::UpdateFile { dest, .. }
            | SyncAction::Recurse { dest, .. } => dest,
        }
    }
}

/// 差异计算器
pub struct DiffPlanner<'a> {
    exclusions: &'a ExclusionSets,
    comparator: &'a TimestampComparator,
}

impl<'a> DiffPlanner<'a> {
    pub fn new(exclusions: &'a ExclusionSets, comparator: &'a TimestampComparator) -> Self {
        Self {
            exclusions,
            comparator,
        }
    }

    /// 阶段一：目标中多余的文件
    pub fn plan_file_deletions(
        &self,
        source: &DirectoryListing,
        dest: &DirectoryListing,
        dest_dir: &Path,
    ) -> Vec<SyncAction> {
        dest.files
            .keys()
            .filter(|name| !self.exclusions.is_file_excluded(name))
            .filter(|name| !source.has_file(name))
            .map(|name| SyncAction::DeleteFile {
                path: dest_dir.join(name),
            })
            .collect()
    }

    /// 阶段二：缺失的文件复制，过期的文件更新
    ///
    /// 目标中同名的是目录时跳过，等目录删除后再复制。
    pub fn plan_file_transfers(
        &self,
        source: &DirectoryListing,
        dest: &DirectoryListing,
        source_dir: &Path,
        dest_dir: &Path,
    ) -> Vec<SyncAction> {
        let mut actions = Vec::new();

        for (name, src_meta) in &source.files {
            if self.exclusions.is_file_excluded(name) || dest.has_subdirectory(name) {
                continue;
            }

            match dest.files.get(name) {
                None => actions.push(SyncAction::CopyFile {
                    source: source_dir.join(name),
                    dest: dest_dir.join(name),
                }),
                Some(dst_meta) if self.comparator.files_differ(src_meta, dst_meta) => {
                    actions.push(SyncAction::UpdateFile {
                        source: source_dir.join(name),
                        dest: dest_dir.join(name),
                    })
                }
                Some(_) => {}
            }
        }

        actions
    }

    /// 阶段三：目标中多余的目录
    pub fn plan_directory_deletions(
        &self,
        source: &DirectoryListing,
        dest: &DirectoryListing,
        dest_dir: &Path,
    ) -> Vec<SyncAction> {
        dest.subdirectories
            .iter()
            .filter(|name| !self.exclusions.is_directory_excluded(name))
            .filter(|name| !source.has_subdirectory(name))
            .map(|name| SyncAction::DeleteDirectory {
                path: dest_dir.join(name),
            })
            .collect()
    }

    /// 阶段四：缺失的目录先创建，然后所有匹配目录都进入递归
    ///
    /// 每个子目录产生可选的 `CreateDirectory` 加一个 `Recurse`，按名称排序。
    pub fn plan_directory_creations(
        &self,
        source: &DirectoryListing,
        dest: &DirectoryListing,
        source_dir: &Path,
        dest_dir: &Path,
    ) -> Vec<SyncAction> {
        let mut actions = Vec::new();

        for name in &source.subdirectories {
            if self.exclusions.is_directory_excluded(name) {
                continue;
            }

            if !dest.has_subdirectory(name) {
                actions.push(SyncAction::CreateDirectory {
                    path: dest_dir.join(name),
                });
            }
            actions.push(SyncAction::Recurse {
                source: source_dir.join(name),
                dest: dest_dir.join(name),
            });
        }

        actions
    }
}

/// 动作统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionSummary {
    pub files_deleted: usize,
    pub files_copied: usize,
    pub files_updated: usize,
    pub dirs_deleted: usize,
    pub dirs_created: usize,
    pub dirs_visited: usize,
}

impl ActionSummary {
    pub fn record(&mut self, kind: ActionKind) {
        match kind {
            ActionKind::DeleteFile => self.files_deleted += 1,
            ActionKind::CopyFile => self.files_copied += 1,
            ActionKind::UpdateFile => self.files_updated += 1,
            ActionKind::DeleteDirectory => self.dirs_deleted += 1,
            ActionKind::CreateDirectory => self.dirs_created += 1,
            ActionKind::Recurse => self.dirs_visited += 1,
        }
    }

    /// 修改文件系统的动作总数
    pub fn mutations(&self) -> usize {
        self.files_deleted
            + self.files_copied
            + self.files_updated
            + self.dirs_deleted
            + self.dirs_created
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::FileMeta;

    fn file(modified_time: i64) -> FileMeta {
        FileMeta {
            size: 1,
            modified_time,
            is_dir: false,
        }
    }

    fn listing(files: &[(&str, i64)], dirs: &[&str]) -> DirectoryListing {
        DirectoryListing {
            files: files
                .iter()
                .map(|(name, t)| (name.to_string(), file(*t)))
                .collect(),
            subdirectories: dirs.iter().map(|d| d.to_string()).collect(),
        }
    }

    fn planner_parts() -> (ExclusionSets, TimestampComparator) {
        (ExclusionSets::default(), TimestampComparator::default())
    }

    #[test]
    fn test_file_deletions_skip_excluded_and_present() {
        let (ex, cmp) = planner_parts();
        let planner = DiffPlanner::new(&ex, &cmp);
        let src = listing(&[("keep.txt", 0)], &[]);
        let dst = listing(
            &[("keep.txt", 0), ("old.txt", 0), (".DS_Store", 0), ("._old.txt", 0)],
            &[],
        );

        let actions = planner.plan_file_deletions(&src, &dst, Path::new("/d"));
        assert_eq!(
            actions,
            vec![SyncAction::DeleteFile {
                path: PathBuf::from("/d/old.txt")
            }]
        );
    }

    #[test]
    fn test_file_transfers() {
        let (ex, cmp) = planner_parts();
        let planner = DiffPlanner::new(&ex, &cmp);
        let src = listing(
            &[
                ("new.txt", 10_000),
                ("same.txt", 10_000),
                ("dst.txt", 10_000),
                ("changed.txt", 10_000),
                ("Thumbs.db", 10_000),
            ],
            &[],
        );
        let dst = listing(
            &[
                ("same.txt", 11_000),
                ("dst.txt", 10_000 + 3_600_000),
                ("changed.txt", 13_000),
            ],
            &[],
        );

        let actions = planner.plan_file_transfers(&src, &dst, Path::new("/s"), Path::new("/d"));
        assert_eq!(
            actions,
            vec![
                SyncAction::UpdateFile {
                    source: PathBuf::from("/s/changed.txt"),
                    dest: PathBuf::from("/d/changed.txt"),
                },
                SyncAction::CopyFile {
                    source: PathBuf::from("/s/new.txt"),
                    dest: PathBuf::from("/d/new.txt"),
                },
            ]
        );
    }

    #[test]
    fn test_file_transfer_waits_for_directory_with_same_name() {
        let (ex, cmp) = planner_parts();
        let planner = DiffPlanner::new(&ex, &cmp);
        let src = listing(&[("Y", 0)], &[]);
        let dst = listing(&[], &["Y"]);

        assert!(planner
            .plan_file_transfers(&src, &dst, Path::new("/s"), Path::new("/d"))
            .is_empty());
        assert_eq!(
            planner.plan_directory_deletions(&src, &dst, Path::new("/d")),
            vec![SyncAction::DeleteDirectory {
                path: PathBuf::from("/d/Y")
            }]
        );
    }

    #[test]
    fn test_directory_deletions_leave_forbidden_alone() {
        let (ex, cmp) = planner_parts();
        let planner = DiffPlanner::new(&ex, &cmp);
        let src = listing(&[], &["a"]);
        let dst = listing(&[], &["a", "b", ".Trashes"]);

        let actions = planner.plan_directory_deletions(&src, &dst, Path::new("/d"));
        assert_eq!(
            actions,
            vec![SyncAction::DeleteDirectory {
                path: PathBuf::from("/d/b")
            }]
        );
    }

    #[test]
    fn test_directory_creations_and_recursion() {
        let (ex, cmp) = planner_parts();
        let planner = DiffPlanner::new(&ex, &cmp);
        let src = listing(&[], &["a", "b", "$RECYCLE.BIN"]);
        let dst = listing(&[], &["b"]);

        let actions =
            planner.plan_directory_creations(&src, &dst, Path::new("/s"), Path::new("/d"));
        assert_eq!(
            actions,
            vec![
                SyncAction::CreateDirectory {
                    path: PathBuf::from("/d/a")
                },
                SyncAction::Recurse {
                    source: PathBuf::from("/s/a"),
                    dest: PathBuf::from("/d/a"),
                },
                SyncAction::Recurse {
                    source: PathBuf::from("/s/b"),
                    dest: PathBuf::from("/d/b"),
                },
            ]
        );
    }

    #[test]
    fn test_names_match_exactly() {
        let (ex, cmp) = planner_parts();
        let planner = DiffPlanner::new(&ex, &cmp);
        let src = listing(&[("Report.txt", 0)], &[]);
        let dst = listing(&[("report.txt", 0)], &[]);

        assert_eq!(
            planner.plan_file_deletions(&src, &dst, Path::new("/d")),
            vec![SyncAction::DeleteFile {
                path: PathBuf::from("/d/report.txt")
            }]
        );
        assert_eq!(
            planner.plan_file_transfers(&src, &dst, Path::new("/s"), Path::new("/d")),
            vec![SyncAction::CopyFile {
                source: PathBuf::from("/s/Report.txt"),
                dest: PathBuf::from("/d/Report.txt"),
            }]
        );
    }

    #[test]
    fn test_matching_listings_plan_no_mutations() {
        let (ex, cmp) = planner_parts();
        let planner = DiffPlanner::new(&ex, &cmp);
        let src = listing(&[("a.txt", 5_000)], &["x", "y"]);
        let dst = src.clone();

        let (s, d) = (Path::new("/s"), Path::new("/d"));
        assert!(planner.plan_file_deletions(&src, &dst, d).is_empty());
        assert!(planner.plan_file_transfers(&src, &dst, s, d).is_empty());
        assert!(planner.plan_directory_deletions(&src, &dst, d).is_empty());

        let mut summary = ActionSummary::default();
        for action in planner.plan_directory_creations(&src, &dst, s, d) {
            summary.record(action.kind());
        }
        assert_eq!(summary.mutations(), 0);
        assert_eq!(summary.dirs_visited, 2);
    }

    #[test]
    fn test_empty_exclusions_consider_everything() {
        let ex = ExclusionSets::none();
        let cmp = TimestampComparator::default();
        let planner = DiffPlanner::new(&ex, &cmp);
        let src = listing(&[(".DS_Store", 0)], &[]);
        let dst = DirectoryListing::default();

        let actions = planner.plan_file_transfers(&src, &dst, Path::new("/s"), Path::new("/d"));
        assert_eq!(actions.len(), 1);
    }

    #[test]
    fn test_action_labels() {
        assert_eq!(ActionKind::DeleteFile.to_string(), "delete file");
        assert_eq!(ActionKind::CreateDirectory.label(), "create dir");
        assert!(!ActionKind::Recurse.is_mutating());
    }
}
