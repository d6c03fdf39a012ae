use reclaimer_core::{ExclusionRules, ProgressEvent, ReclaimConfig, Reclaimer, Target};
use std::fs;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 创建临时缓存目录
    let temp_dir = TempDir::new()?;
    let root = temp_dir.path();
    for d in 0..20 {
        let dir = root.join(format!("cache_{d}")).join("blobs");
        fs::create_dir_all(&dir)?;
        for f in 0..50 {
            fs::write(dir.join(format!("blob_{f}.tmp")), "x".repeat(256))?;
        }
    }
    fs::write(root.join("keep.sav"), "protected")?;
    fs::create_dir_all(root.join("empty"))?;

    println!("测试目录: {}", root.display());

    let config = ReclaimConfig {
        targets: vec![Target::new(root)],
        rules: ExclusionRules::new([".sav"], ["roblox"]),
        force: true,
        concurrency_limit: 8,
        progress_interval: Duration::from_millis(10),
        ..Default::default()
    };
    let reclaimer = Reclaimer::new(config)?;

    let progress_log = Arc::new(Mutex::new(Vec::<ProgressEvent>::new()));
    let progress_log_clone = progress_log.clone();

    println!("\n开始回收...");
    let summary = reclaimer.run_with_progress(move |event| {
        println!(
            "进度: {:?} - 文件 {} / 目录 {} / 跳过 {} / 失败 {}",
            event.phase,
            event.snapshot.files_deleted,
            event.snapshot.folders_deleted,
            event.snapshot.skipped,
            event.snapshot.failed
        );

        if let Ok(mut log) = progress_log_clone.lock() {
            log.push(event);
        }
    });

    println!(
        "\n回收完成! 共删除 {} 个条目，耗时 {:.3}s",
        summary.stats.total_deleted(),
        summary.elapsed_secs()
    );

    let log = progress_log.lock().map_err(|e| e.to_string())?;
    println!("\n进度日志 ({} 条记录)", log.len());

    Ok(())
}
