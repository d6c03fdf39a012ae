use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

pub mod cleaner;
pub mod disk;
pub mod error;
pub mod filter;
pub mod fs;
pub mod locked;
pub mod pool;
pub mod process;
pub mod progress;
pub mod pruner;
pub mod remover;
pub mod scanner;
pub mod target;

pub use cleaner::{ReclaimConfig, Reclaimer, RunSummary};
pub use disk::{DiskSpace, VolumeChange};
pub use error::{Outcome, ReclaimError, Result};
pub use filter::{AgePolicy, ExclusionFilter, ExclusionRules};
pub use fs::{FileSystem, LocalFs};
pub use locked::{GroupOutcome, LockedResourceReclaimer};
pub use pool::WorkerPool;
pub use process::{ProcessController, SystemProcessController};
pub use progress::{ProgressEvent, ProgressObserver, ProgressReporter, ReclaimPhase};
pub use pruner::EmptyDirectoryPruner;
pub use remover::ConcurrentRemover;
pub use scanner::PathEnumerator;
pub use target::{CandidateItem, ResourceGroup, Target};

/// 一次回收过程的共享计数器
///
/// 每次运行新建一个，工作线程只能递增，不能重置。
#[derive(Debug, Default)]
pub struct ReclaimStats {
    files_deleted: AtomicU64,
    folders_deleted: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
    dispatched: AtomicU64,
}

impl ReclaimStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一个条目的最终结果
    pub fn record(&self, outcome: Outcome) {
        let counter = match outcome {
            Outcome::FileDeleted => &self.files_deleted,
            Outcome::FolderDeleted => &self.folders_deleted,
            Outcome::Skipped => &self.skipped,
            Outcome::Failed => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// 记录一个已派发给工作线程的条目
    pub fn mark_dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    /// 读取当前计数（各字段分别读取，并发写入时可能不是同一时刻的值）
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            files_deleted: self.files_deleted.load(Ordering::Relaxed),
            folders_deleted: self.folders_deleted.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
        }
    }
}

/// 计数器快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub files_deleted: u64,
    pub folders_deleted: u64,
    pub skipped: u64,
    pub failed: u64,
    pub dispatched: u64,
}

impl StatsSnapshot {
    /// 删除的条目总数
    pub fn total_deleted(&self) -> u64 {
        self.files_deleted + self.folders_deleted
    }

    /// 已记录结果的条目总数
    pub fn accounted(&self) -> u64 {
        self.files_deleted + self.folders_deleted + self.skipped + self.failed
    }
}

/// 把字节数格式化为便于阅读的大小
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}
