use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::debug;

use crate::error::{ReclaimError, Result};

/// 有界工作线程池
///
/// 同时执行的任务数不超过 `limit`；每个提交的任务恰好执行一次。
pub struct WorkerPool {
    pool: ThreadPool,
    limit: usize,
}

impl WorkerPool {
    /// 创建指定并发上限的线程池
    pub fn new(limit: usize) -> Result<Self> {
        if limit == 0 {
            return Err(ReclaimError::InvalidConfig(
                "并发上限必须大于 0".to_string(),
            ));
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(limit)
            .thread_name(|i| format!("reclaimer-worker-{i}"))
            .build()?;

        debug!("创建工作线程池，并发上限 {}", limit);
        Ok(Self { pool, limit })
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// 提交全部任务并等待它们完成
    pub fn run_all<T, F>(&self, items: Vec<T>, task: F)
    where
        T: Send,
        F: Fn(T) + Sync,
    {
        let task = &task;
        self.pool.scope(|scope| {
            for item in items {
                scope.spawn(move |_| task(item));
            }
        });
    }
}
