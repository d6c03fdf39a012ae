use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::error::{ReclaimError, Result};
use crate::filter::{AgePolicy, ExclusionFilter, ExclusionRules};
use crate::fs::{FileSystem, LocalFs};
use crate::locked::LockedResourceReclaimer;
use crate::pool::WorkerPool;
use crate::process::{ProcessController, SystemProcessController};
use crate::progress::{ProgressEvent, ProgressObserver, ProgressReporter, ReclaimPhase};
use crate::pruner::EmptyDirectoryPruner;
use crate::remover::ConcurrentRemover;
use crate::scanner::PathEnumerator;
use crate::target::{ResourceGroup, Target};
use crate::{ReclaimStats, StatsSnapshot};

/// 回收器配置
#[derive(Debug, Clone)]
pub struct ReclaimConfig {
    pub targets: Vec<Target>,
    pub rules: ExclusionRules,
    pub resource_groups: Vec<ResourceGroup>,
    /// 忽略文件年龄，并允许终止占用资源的进程
    pub force: bool,
    /// 非强制模式下，只删除最后修改时间早于此阈值的条目
    pub age_threshold: Duration,
    /// 同时进行的文件系统操作上限
    pub concurrency_limit: usize,

    // 资源组选项
    /// 终止进程后等待文件句柄释放的时间
    pub grace_period: Duration,
    /// 删除失败后重试前的等待时间
    pub retry_backoff: Duration,

    pub progress_interval: Duration,
    /// 主删除流程结束后清理空目录
    pub prune_empty_dirs: bool,
}

impl Default for ReclaimConfig {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            rules: ExclusionRules::default(),
            resource_groups: Vec::new(),
            force: false,
            age_threshold: Duration::from_secs(24 * 60 * 60),
            concurrency_limit: 500,

            grace_period: Duration::from_secs(1),
            retry_backoff: Duration::from_secs(1),

            progress_interval: Duration::from_millis(50),
            prune_empty_dirs: true,
        }
    }
}

/// 一次回收的汇总结果
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub stats: StatsSnapshot,
    pub duration: Duration,
}

impl RunSummary {
    pub fn elapsed_secs(&self) -> f64 {
        self.duration.as_secs_f64()
    }
}

/// 回收器：依次执行主删除、资源组回收和空目录清理
pub struct Reclaimer {
    config: ReclaimConfig,
    fs: Arc<dyn FileSystem>,
    processes: Arc<dyn ProcessController>,
    filter: Arc<ExclusionFilter>,
    pool: Arc<WorkerPool>,
}

impl Reclaimer {
    /// 使用本地文件系统和系统进程控制器创建回收器
    pub fn new(config: ReclaimConfig) -> Result<Self> {
        Self::with_collaborators(
            config,
            Arc::new(LocalFs),
            Arc::new(SystemProcessController::new()),
        )
    }

    pub fn with_collaborators(
        config: ReclaimConfig,
        fs: Arc<dyn FileSystem>,
        processes: Arc<dyn ProcessController>,
    ) -> Result<Self> {
        if config.progress_interval.is_zero() {
            return Err(ReclaimError::InvalidConfig(
                "进度刷新间隔必须大于 0".to_string(),
            ));
        }

        let pool = Arc::new(WorkerPool::new(config.concurrency_limit)?);
        let filter = Arc::new(ExclusionFilter::new(config.rules.clone()));

        Ok(Self {
            config,
            fs,
            processes,
            filter,
            pool,
        })
    }

    pub fn config(&self) -> &ReclaimConfig {
        &self.config
    }

    /// 执行一次完整的回收
    pub fn run(&self) -> RunSummary {
        self.run_with_progress(|_| {})
    }

    /// 执行一次完整的回收（带进度回调）
    pub fn run_with_progress<F>(&self, progress_callback: F) -> RunSummary
    where
        F: Fn(ProgressEvent) + Send + Sync + 'static,
    {
        let start_time = Instant::now();
        let stats = Arc::new(ReclaimStats::new());
        let observer: ProgressObserver = Arc::new(progress_callback);

        info!(
            "开始回收 {} 个目标，{} 个资源组，强制模式: {}",
            self.config.targets.len(),
            self.config.resource_groups.len(),
            self.config.force
        );

        self.observe(ReclaimPhase::Removing, &stats, &observer, || {
            self.remove_targets(&stats)
        });

        self.observe(ReclaimPhase::Reclaiming, &stats, &observer, || {
            self.reclaim_locked(&stats)
        });

        if self.config.prune_empty_dirs {
            self.observe(ReclaimPhase::Pruning, &stats, &observer, || {
                self.prune_empty(&stats)
            });
        }

        let summary = RunSummary {
            stats: stats.snapshot(),
            duration: start_time.elapsed(),
        };
        observer(ProgressEvent {
            phase: ReclaimPhase::Complete,
            snapshot: summary.stats,
        });

        info!(
            "回收完成: 删除文件 {} 个，目录 {} 个，跳过 {} 个，失败 {} 个，耗时 {:.2}s",
            summary.stats.files_deleted,
            summary.stats.folders_deleted,
            summary.stats.skipped,
            summary.stats.failed,
            summary.elapsed_secs()
        );

        summary
    }

    /// 在进度上报期间执行一个阶段
    fn observe<R>(
        &self,
        phase: ReclaimPhase,
        stats: &Arc<ReclaimStats>,
        observer: &ProgressObserver,
        work: impl FnOnce() -> R,
    ) -> R {
        let reporter = ProgressReporter::start(
            phase,
            Arc::clone(stats),
            self.config.progress_interval,
            Arc::clone(observer),
        );
        let result = work();
        reporter.stop();
        result
    }

    fn remove_targets(&self, stats: &ReclaimStats) -> usize {
        let enumerator = PathEnumerator::new(Arc::clone(&self.fs));
        let remover = ConcurrentRemover::new(
            Arc::clone(&self.fs),
            Arc::clone(&self.filter),
            Arc::clone(&self.pool),
        );
        let policy = AgePolicy::new(self.config.force, self.config.age_threshold);

        let mut dispatched = 0;
        for target in &self.config.targets {
            if target.path.as_os_str().is_empty() {
                warn!("忽略空的目标路径");
                continue;
            }

            let items = PathEnumerator::sort_by_depth(enumerator.enumerate(&target.path));
            let protected = self.filter.protected_dirs(&target.path, &items);
            let candidates = policy
                .with_override(target.older_than)
                .filter_candidates(items);

            debug!(
                "{:?}: {} 个候选条目，{} 个受保护目录",
                target.path,
                candidates.len(),
                protected.len()
            );
            dispatched += remover.remove_all(candidates, &protected, stats);
        }

        dispatched
    }

    fn reclaim_locked(&self, stats: &ReclaimStats) {
        if self.config.resource_groups.is_empty() {
            return;
        }

        LockedResourceReclaimer::new(
            Arc::clone(&self.fs),
            Arc::clone(&self.processes),
            Arc::clone(&self.pool),
            self.config.force,
        )
        .with_timing(self.config.grace_period, self.config.retry_backoff)
        .reclaim_all(&self.config.resource_groups, stats);
    }

    fn prune_empty(&self, stats: &ReclaimStats) -> usize {
        let roots: Vec<&Path> = self
            .config
            .targets
            .iter()
            .map(|t| t.path.as_path())
            .filter(|p| !p.as_os_str().is_empty())
            .collect();

        EmptyDirectoryPruner::new(Arc::clone(&self.fs), Arc::clone(&self.pool))
            .prune_all(&roots, stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::testing::RecordingFs;
    use std::fs::{self, File};
    use std::sync::Mutex;
    use std::time::SystemTime;
    use tempfile::TempDir;

    struct IdleProcesses;

    impl ProcessController for IdleProcesses {
        fn is_running(&self, _name: &str) -> bool {
            false
        }

        fn terminate(&self, _name: &str) -> Result<()> {
            Ok(())
        }
    }

    fn backdate(path: &Path, age: Duration) -> anyhow::Result<()> {
        let file = File::options().write(true).open(path)?;
        file.set_modified(SystemTime::now() - age)?;
        Ok(())
    }

    fn test_config(root: &Path) -> ReclaimConfig {
        ReclaimConfig {
            targets: vec![Target::new(root)],
            rules: ExclusionRules::new([".sav"], ["roblox"]),
            concurrency_limit: 4,
            grace_period: Duration::ZERO,
            retry_backoff: Duration::ZERO,
            progress_interval: Duration::from_millis(5),
            ..ReclaimConfig::default()
        }
    }

    fn reclaimer(config: ReclaimConfig) -> anyhow::Result<Reclaimer> {
        Ok(Reclaimer::with_collaborators(
            config,
            Arc::new(LocalFs),
            Arc::new(IdleProcesses),
        )?)
    }

    #[test]
    fn test_default_config() {
        let config = ReclaimConfig::default();
        assert!(!config.force);
        assert_eq!(config.concurrency_limit, 500);
        assert_eq!(config.age_threshold, Duration::from_secs(86_400));
        assert_eq!(config.progress_interval, Duration::from_millis(50));
        assert!(config.prune_empty_dirs);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let zero_limit = ReclaimConfig {
            concurrency_limit: 0,
            ..ReclaimConfig::default()
        };
        assert!(matches!(
            Reclaimer::new(zero_limit),
            Err(ReclaimError::InvalidConfig(_))
        ));

        let zero_interval = ReclaimConfig {
            progress_interval: Duration::ZERO,
            ..ReclaimConfig::default()
        };
        assert!(matches!(
            Reclaimer::new(zero_interval),
            Err(ReclaimError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_recent_files_kept_without_force() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();
        fs::write(root.join("old.txt"), "x")?;
        fs::write(root.join("new.txt"), "x")?;
        backdate(&root.join("old.txt"), Duration::from_secs(48 * 3600))?;

        let summary = reclaimer(test_config(root))?.run();

        assert!(!root.join("old.txt").exists());
        assert!(root.join("new.txt").exists());
        assert_eq!(summary.stats.files_deleted, 1);
        assert_eq!(summary.stats.dispatched, 1);

        Ok(())
    }

    #[test]
    fn test_force_ignores_age() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();
        fs::write(root.join("new.txt"), "x")?;

        let config = ReclaimConfig {
            force: true,
            ..test_config(root)
        };
        let summary = reclaimer(config)?.run();

        assert!(!root.join("new.txt").exists());
        assert_eq!(summary.stats.files_deleted, 1);

        Ok(())
    }

    #[test]
    fn test_per_target_threshold_override() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();
        fs::write(root.join("hour_old.txt"), "x")?;
        backdate(&root.join("hour_old.txt"), Duration::from_secs(3600))?;

        let config = ReclaimConfig {
            targets: vec![Target::new(root).with_older_than(Duration::from_secs(60))],
            ..test_config(root)
        };
        let summary = reclaimer(config)?.run();

        assert!(!root.join("hour_old.txt").exists());
        assert_eq!(summary.stats.files_deleted, 1);

        Ok(())
    }

    #[test]
    fn test_phases_reported_in_order() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);

        let summary = reclaimer(test_config(temp_dir.path()))?.run_with_progress(move |event| {
            if let Ok(mut events) = sink.lock() {
                events.push(event);
            }
        });

        let events = events.lock().map(|e| e.clone()).unwrap_or_default();
        let mut phases: Vec<ReclaimPhase> = events.iter().map(|e| e.phase).collect();
        phases.dedup();
        assert_eq!(
            phases,
            vec![
                ReclaimPhase::Removing,
                ReclaimPhase::Reclaiming,
                ReclaimPhase::Pruning,
                ReclaimPhase::Complete,
            ]
        );
        assert_eq!(events.last().map(|e| e.snapshot), Some(summary.stats));

        Ok(())
    }

    #[test]
    fn test_prune_can_be_disabled() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();
        fs::create_dir_all(root.join("empty"))?;

        let config = ReclaimConfig {
            prune_empty_dirs: false,
            ..test_config(root)
        };
        let summary = reclaimer(config)?.run();

        assert!(root.join("empty").exists());
        assert_eq!(summary.stats.folders_deleted, 0);

        Ok(())
    }

    #[test]
    fn test_empty_target_path_ignored() -> anyhow::Result<()> {
        let config = ReclaimConfig {
            targets: vec![Target::new("")],
            ..test_config(Path::new(""))
        };
        let summary = reclaimer(config)?.run();
        assert_eq!(summary.stats, StatsSnapshot::default());

        Ok(())
    }

    #[test]
    fn test_resource_groups_reclaimed() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let cache = temp_dir.path().join("profile").join("cache2");
        fs::create_dir_all(&cache)?;
        fs::write(cache.join("entry"), "x")?;

        let recording = Arc::new(RecordingFs::new());
        let config = ReclaimConfig {
            targets: Vec::new(),
            resource_groups: vec![ResourceGroup::new("firefox.exe", vec![cache.clone()])],
            ..test_config(temp_dir.path())
        };
        let summary =
            Reclaimer::with_collaborators(config, recording.clone(), Arc::new(IdleProcesses))?.run();

        assert!(!cache.exists());
        assert_eq!(recording.removal_count(), 1);
        assert_eq!(summary.stats.folders_deleted, 1);
        assert_eq!(summary.stats.accounted(), summary.stats.dispatched);

        Ok(())
    }

    #[test]
    fn test_runs_do_not_share_stats() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();
        fs::write(root.join("a.txt"), "x")?;

        let config = ReclaimConfig {
            force: true,
            ..test_config(root)
        };
        let reclaimer = reclaimer(config)?;

        let first = reclaimer.run();
        let second = reclaimer.run();

        assert_eq!(first.stats.files_deleted, 1);
        assert_eq!(second.stats, StatsSnapshot::default());

        Ok(())
    }
}
