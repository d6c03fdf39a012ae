use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::ReclaimStats;
use crate::error::{Outcome, ReclaimError};
use crate::fs::FileSystem;
use crate::pool::WorkerPool;
use crate::scanner::PathEnumerator;
use crate::target::CandidateItem;

/// 空目录清理器
///
/// 每次调用只清理一层：只有枚举时就没有任何子条目的目录才会被删除，
/// 删除后变空的父目录要等下一次调用。
pub struct EmptyDirectoryPruner {
    fs: Arc<dyn FileSystem>,
    pool: Arc<WorkerPool>,
}

impl EmptyDirectoryPruner {
    pub fn new(fs: Arc<dyn FileSystem>, pool: Arc<WorkerPool>) -> Self {
        Self { fs, pool }
    }

    /// 清理所有根目录下的空目录，返回派发的目录数
    pub fn prune_all<P: AsRef<Path>>(&self, roots: &[P], stats: &ReclaimStats) -> usize {
        roots
            .iter()
            .map(|root| self.prune(root.as_ref(), stats))
            .sum()
    }

    /// 清理单个根目录下的空目录（不含根目录本身）
    pub fn prune(&self, root: &Path, stats: &ReclaimStats) -> usize {
        let candidates = self.empty_candidates(root);
        let count = candidates.len();
        if count == 0 {
            return 0;
        }

        info!("在 {:?} 下发现 {} 个空目录", root, count);
        self.pool.run_all(candidates, |item| {
            stats.mark_dispatched();
            stats.record(self.remove_empty(&item.path));
        });

        count
    }

    /// 枚举时没有子条目的目录，最深的在前
    fn empty_candidates(&self, root: &Path) -> Vec<CandidateItem> {
        let items = PathEnumerator::new(Arc::clone(&self.fs)).enumerate(root);
        let parents: HashSet<&Path> = items.iter().filter_map(|i| i.path.parent()).collect();

        let empty: Vec<CandidateItem> = items
            .iter()
            .filter(|i| i.is_dir && !parents.contains(i.path.as_path()))
            .cloned()
            .collect();

        PathEnumerator::sort_by_depth(empty)
    }

    fn remove_empty(&self, path: &Path) -> Outcome {
        match self.fs.remove_if_empty(path) {
            Ok(true) => {
                debug!("已删除空目录: {:?}", path);
                Outcome::FolderDeleted
            }
            Ok(false) => {
                debug!("目录非空或无法读取，跳过: {:?}", path);
                Outcome::Skipped
            }
            Err(e) => {
                let err = ReclaimError::from_io(path, e);
                if err.outcome() == Outcome::Failed {
                    warn!("{}", err);
                }
                err.outcome()
            }
        }
    }
}
