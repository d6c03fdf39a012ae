use crossbeam_channel::{Receiver, Sender, bounded, select, tick};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::{ReclaimStats, StatsSnapshot};

/// 回收过程所处的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReclaimPhase {
    Removing,
    Reclaiming,
    Pruning,
    Complete,
}

/// 推送给观察者的进度事件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub phase: ReclaimPhase,
    pub snapshot: StatsSnapshot,
}

/// 进度观察者
pub type ProgressObserver = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// 周期性读取计数器并推送给观察者
///
/// 停止时先发出停止信号，再等待后台线程确认；后台线程退出前恰好推送一次最终快照。
pub struct ProgressReporter {
    stats: Arc<ReclaimStats>,
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<StatsSnapshot>>,
}

impl ProgressReporter {
    /// 以固定间隔推送进度
    pub fn start(
        phase: ReclaimPhase,
        stats: Arc<ReclaimStats>,
        interval: Duration,
        observer: ProgressObserver,
    ) -> Self {
        Self::with_ticker(phase, stats, tick(interval), observer)
    }

    /// 使用外部提供的时钟信号推送进度
    pub fn with_ticker(
        phase: ReclaimPhase,
        stats: Arc<ReclaimStats>,
        ticks: Receiver<Instant>,
        observer: ProgressObserver,
    ) -> Self {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let worker_stats = Arc::clone(&stats);

        let spawned = thread::Builder::new()
            .name("reclaimer-progress".to_string())
            .spawn(move || report_loop(phase, worker_stats, ticks, stop_rx, observer));

        let handle = match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("无法启动进度线程: {}", e);
                None
            }
        };

        Self {
            stats,
            stop_tx: Some(stop_tx),
            handle,
        }
    }

    /// 停止推送并返回最终快照
    pub fn stop(mut self) -> StatsSnapshot {
        self.shutdown()
    }

    fn shutdown(&mut self) -> StatsSnapshot {
        if let Some(stop_tx) = self.stop_tx.take() {
            // 线程已退出时发送会失败，忽略即可
            let _ = stop_tx.send(());
        }

        match self.handle.take() {
            Some(handle) => handle.join().unwrap_or_else(|_| {
                warn!("进度线程异常退出");
                self.stats.snapshot()
            }),
            None => self.stats.snapshot(),
        }
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.shutdown();
        }
    }
}

fn report_loop(
    phase: ReclaimPhase,
    stats: Arc<ReclaimStats>,
    ticks: Receiver<Instant>,
    stop_rx: Receiver<()>,
    observer: ProgressObserver,
) -> StatsSnapshot {
    debug!("进度线程启动: {:?}", phase);

    loop {
        select! {
            recv(ticks) -> msg => {
                if msg.is_err() {
                    // 时钟已关闭，只等待停止信号
                    let _ = stop_rx.recv();
                    break;
                }
                observer(ProgressEvent {
                    phase,
                    snapshot: stats.snapshot(),
                });
            }
            recv(stop_rx) -> _ => break,
        }
    }

    let snapshot = stats.snapshot();
    observer(ProgressEvent { phase, snapshot });
    debug!("进度线程退出: {:?}", phase);
    snapshot
}
