use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::ReclaimStats;
use crate::error::{Outcome, ReclaimError};
use crate::fs::FileSystem;
use crate::pool::WorkerPool;
use crate::process::ProcessController;
use crate::target::ResourceGroup;

/// 单个资源组的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupOutcome {
    /// 所属进程正在运行且未开启强制模式，整组未动
    Respected,
    /// 无法终止所属进程，整组放弃
    Abandoned,
    /// 已尝试删除的目录数
    Attempted(usize),
}

/// 被进程占用的资源组回收器
pub struct LockedResourceReclaimer {
    fs: Arc<dyn FileSystem>,
    processes: Arc<dyn ProcessController>,
    pool: Arc<WorkerPool>,
    force: bool,
    grace_period: Duration,
    retry_backoff: Duration,
}

impl LockedResourceReclaimer {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        processes: Arc<dyn ProcessController>,
        pool: Arc<WorkerPool>,
        force: bool,
    ) -> Self {
        Self {
            fs,
            processes,
            pool,
            force,
            grace_period: Duration::from_secs(1),
            retry_backoff: Duration::from_secs(1),
        }
    }

    /// 设置终止进程后的等待时间与重试间隔
    pub fn with_timing(mut self, grace_period: Duration, retry_backoff: Duration) -> Self {
        self.grace_period = grace_period;
        self.retry_backoff = retry_backoff;
        self
    }

    /// 每个目录最多尝试删除的次数
    pub fn max_attempts(&self) -> usize {
        if self.force { 2 } else { 1 }
    }

    /// 并发处理所有资源组
    pub fn reclaim_all(&self, groups: &[ResourceGroup], stats: &ReclaimStats) -> Vec<GroupOutcome> {
        if groups.is_empty() {
            return Vec::new();
        }

        thread::scope(|scope| {
            let handles: Vec<_> = groups
                .iter()
                .map(|group| scope.spawn(move || self.reclaim_group(group, stats)))
                .collect();

            handles
                .into_iter()
                .map(|handle| {
                    handle.join().unwrap_or_else(|_| {
                        warn!("资源组处理线程异常退出");
                        GroupOutcome::Abandoned
                    })
                })
                .collect()
        })
    }

    /// 处理单个资源组
    pub fn reclaim_group(&self, group: &ResourceGroup, stats: &ReclaimStats) -> GroupOutcome {
        let name = group.process_name.as_str();

        if self.processes.is_running(name) {
            if !self.force {
                info!("{} 正在运行，跳过其 {} 个目录", name, group.directories.len());
                return GroupOutcome::Respected;
            }

            if let Err(e) = self.processes.terminate(name) {
                warn!("{}，放弃该资源组", e);
                return GroupOutcome::Abandoned;
            }

            debug!("等待 {:?} 让 {} 释放文件句柄", self.grace_period, name);
            thread::sleep(self.grace_period);
        }

        let directories: Vec<PathBuf> = group
            .directories
            .iter()
            .filter(|dir| match self.fs.stat(dir) {
                Ok(_) => true,
                Err(e) => {
                    debug!("资源目录不可用 {:?}: {}", dir, e);
                    false
                }
            })
            .cloned()
            .collect();

        let count = directories.len();
        self.pool.run_all(directories, |dir| {
            stats.mark_dispatched();
            stats.record(self.remove_with_retry(&dir));
        });

        GroupOutcome::Attempted(count)
    }

    fn remove_with_retry(&self, path: &Path) -> Outcome {
        let is_dir = match self.fs.stat(path) {
            Ok(meta) => meta.is_dir,
            Err(e) => return ReclaimError::from_io(path, e).outcome(),
        };

        let attempts = self.max_attempts();
        let mut attempt = 1;
        loop {
            let err = match self.fs.remove_recursive(path) {
                Ok(()) => {
                    debug!("已删除资源目录: {:?}", path);
                    return if is_dir {
                        Outcome::FolderDeleted
                    } else {
                        Outcome::FileDeleted
                    };
                }
                Err(e) => ReclaimError::from_io(path, e),
            };

            if err.outcome() != Outcome::Failed || attempt >= attempts {
                match err.outcome() {
                    Outcome::Failed => warn!("{}", err),
                    _ => debug!("跳过: {}", err),
                }
                return err.outcome();
            }

            debug!("第 {} 次删除 {:?} 失败，{:?} 后重试", attempt, path, self.retry_backoff);
            thread::sleep(self.retry_backoff);
            attempt += 1;
        }
    }
}
