use crate::core::diff::ActionKind;
use serde::Serialize;
use std::path::PathBuf;

/// 同步过程中发出的事件，供控制台或其他调用方输出
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum MirrorEvent {
    /// 已执行（或演练模式下计划执行）的修改动作
    Action {
        kind: ActionKind,
        path: PathBuf,
        dry_run: bool,
    },
    /// 目录已访问且无需任何修改
    DirectoryUnchanged { path: PathBuf },
    /// 单个操作失败，同步继续
    Failure { path: PathBuf, message: String },
}
