//! 控制台输出
//!
//! 每个修改动作输出一行 `动作\t路径`；没有任何修改的目录只输出一个 `.`。

use crate::core::MirrorEvent;
use std::io::{self, Write};
use std::path::MAIN_SEPARATOR;
use tokio::sync::mpsc;

/// 超过该长度（字符数）的路径从中间开始折叠
pub const MAX_PATH_CHARS: usize = 500;

const ELLIPSIS: &str = "…";

/// 折叠过长的路径：从中间的路径段开始向两侧替换为 `…`，直到足够短
pub fn format_path(path: &str) -> String {
    if path.chars().count() < MAX_PATH_CHARS {
        return path.to_string();
    }

    let separator = MAIN_SEPARATOR.to_string();
    let mut parts: Vec<&str> = path.split(MAIN_SEPARATOR).collect();
    let mut rendered = path.to_string();

    while rendered.chars().count() >= MAX_PATH_CHARS {
        let mid = (parts.len() / 2) as isize;
        let mut delta = 0isize;
        while mid + delta >= 0 && parts[(mid + delta) as usize] == ELLIPSIS {
            delta -= 1;
        }

        let mut replaced = false;
        if mid + delta >= 0 {
            parts[(mid + delta) as usize] = ELLIPSIS;
            replaced = true;
        }
        let right = (mid - delta) as usize;
        if right < parts.len() && parts[right] != ELLIPSIS {
            parts[right] = ELLIPSIS;
            replaced = true;
        }

        // 单个路径段本身过长时无法继续折叠
        if !replaced {
            break;
        }
        rendered = parts.join(&separator);
    }

    rendered
}

/// 把同步事件写到终端
pub struct ConsoleReporter<W: Write> {
    out: W,
    /// 当前行是否有未换行的进度点
    dots_pending: bool,
}

impl ConsoleReporter<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> ConsoleReporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            dots_pending: false,
        }
    }

    pub fn handle(&mut self, event: &MirrorEvent) -> io::Result<()> {
        match event {
            MirrorEvent::Action { kind, path, .. } => {
                self.end_progress_line()?;
                writeln!(
                    self.out,
                    "{}\t{}",
                    kind.label(),
                    format_path(&path.to_string_lossy())
                )
            }
            MirrorEvent::DirectoryUnchanged { .. } => {
                write!(self.out, ".")?;
                self.dots_pending = true;
                self.out.flush()
            }
            MirrorEvent::Failure { message, .. } => {
                self.end_progress_line()?;
                writeln!(self.out, "error\t{}", message)
            }
        }
    }

    /// 接收事件直到发送端关闭
    pub async fn drain(mut self, mut rx: mpsc::Receiver<MirrorEvent>) -> io::Result<W> {
        while let Some(event) = rx.recv().await {
            self.handle(&event)?;
        }
        self.finish()
    }

    pub fn finish(mut self) -> io::Result<W> {
        self.end_progress_line()?;
        self.out.flush()?;
        Ok(self.out)
    }

    fn end_progress_line(&mut self) -> io::Result<()> {
        if self.dots_pending {
            writeln!(self.out)?;
            self.dots_pending = false;
        }
        Ok(())
    }
}
