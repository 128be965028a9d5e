use crate::config::CompareConfig;
use crate::storage::FileMeta;

/// 修改时间比较器
///
/// 跨文件系统复制时，不同的夏令时处理可能让修改时间恰好偏移一小时，
/// 这种偏移视为未修改。
#[derive(Debug, Clone)]
pub struct TimestampComparator {
    tolerance_ms: i64,
    shift_ms: i64,
}

impl TimestampComparator {
    pub fn new(config: &CompareConfig) -> Self {
        Self {
            tolerance_ms: config.time_tolerance_seconds.saturating_mul(1000),
            shift_ms: config.dst_shift_seconds.saturating_mul(1000),
        }
    }

    /// 两个时间戳（毫秒）是否需要触发更新
    pub fn differ(&self, t1: i64, t2: i64) -> bool {
        let outside = |delta: i64| delta.saturating_abs() >= self.tolerance_ms;

        outside(t1.saturating_sub(t2))
            && outside(t1.saturating_add(self.shift_ms).saturating_sub(t2))
            && outside(t1.saturating_sub(self.shift_ms).saturating_sub(t2))
    }

    pub fn files_differ(&self, source: &FileMeta, dest: &FileMeta) -> bool {
        let differ = self.differ(source.modified_time, dest.modified_time);
        if differ {
            tracing::debug!(
                "文件时间不同 (src_time={}, dst_time={}, diff={}ms)",
                source.modified_time,
                dest.modified_time,
                source.modified_time.saturating_sub(dest.modified_time)
            );
        }
        differ
    }
}

impl Default for TimestampComparator {
    fn default() -> Self {
        Self::new(&CompareConfig::default())
    }
}
