use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::ReclaimStats;
use crate::error::{Outcome, ReclaimError, Result};
use crate::filter::ExclusionFilter;
use crate::fs::{self, FileSystem};
use crate::pool::WorkerPool;
use crate::target::CandidateItem;

/// 并发删除器：把候选条目分派给有界线程池
pub struct ConcurrentRemover {
    fs: Arc<dyn FileSystem>,
    filter: Arc<ExclusionFilter>,
    pool: Arc<WorkerPool>,
}

impl ConcurrentRemover {
    /// 创建新的删除器
    pub fn new(
        fs: Arc<dyn FileSystem>,
        filter: Arc<ExclusionFilter>,
        pool: Arc<WorkerPool>,
    ) -> Self {
        Self { fs, filter, pool }
    }

    /// 删除全部候选条目，返回派发的条目数
    ///
    /// `protected_dirs` 中的目录连同其下的所有条目一起跳过。
    /// 每个条目恰好记录一个结果。
    pub fn remove_all(
        &self,
        candidates: Vec<CandidateItem>,
        protected_dirs: &HashSet<PathBuf>,
        stats: &ReclaimStats,
    ) -> usize {
        let count = candidates.len();
        if count == 0 {
            return 0;
        }

        info!("开始删除 {} 个条目，并发上限 {}", count, self.pool.limit());

        self.pool.run_all(candidates, |item| {
            stats.mark_dispatched();
            let outcome = self.process(&item, protected_dirs);
            stats.record(outcome);
        });

        count
    }

    /// 处理单个条目
    fn process(&self, item: &CandidateItem, protected_dirs: &HashSet<PathBuf>) -> Outcome {
        match self.try_remove(&item.path, protected_dirs) {
            Ok(outcome) => outcome,
            Err(e) => {
                match e.outcome() {
                    Outcome::Failed => warn!("{}", e),
                    _ => debug!("跳过: {}", e),
                }
                e.outcome()
            }
        }
    }

    fn try_remove(&self, path: &Path, protected_dirs: &HashSet<PathBuf>) -> Result<Outcome> {
        // 重新确认条目仍然存在
        let meta = self
            .fs
            .stat(path)
            .map_err(|e| ReclaimError::from_io(path, e))?;

        if self.filter.should_exclude(path) {
            return Err(ReclaimError::Excluded(path.to_path_buf()));
        }

        if meta.is_dir {
            if within_protected(path, protected_dirs)
                || self.filter.subtree_protected(&*self.fs, path)
            {
                return Err(ReclaimError::Excluded(path.to_path_buf()));
            }

            self.fs
                .remove_recursive(path)
                .map_err(|e| ReclaimError::from_io(path, e))?;
            debug!("已删除目录: {:?}", path);
            Ok(Outcome::FolderDeleted)
        } else {
            if path.parent().is_some_and(|p| within_protected(p, protected_dirs)) {
                return Err(ReclaimError::Excluded(path.to_path_buf()));
            }

            // 打开链接会作用到目标上，链接本身不会被占用
            if !meta.is_symlink && fs::is_locked(&*self.fs, path) {
                return Err(ReclaimError::Locked(path.to_path_buf()));
            }

            self.fs
                .remove_recursive(path)
                .map_err(|e| ReclaimError::from_io(path, e))?;
            debug!("已删除{}: {:?}", if meta.is_symlink { "链接" } else { "文件" }, path);
            Ok(Outcome::FileDeleted)
        }
    }
}

/// 路径本身或其任一祖先是否受保护
fn within_protected(path: &Path, protected_dirs: &HashSet<PathBuf>) -> bool {
    !protected_dirs.is_empty() && path.ancestors().any(|a| protected_dirs.contains(a))
}
