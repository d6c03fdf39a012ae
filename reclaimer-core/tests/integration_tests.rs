use anyhow::Result;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

use reclaimer_core::{
    ExclusionRules, LocalFs, ProcessController, ReclaimConfig, ReclaimPhase, Reclaimer,
    ResourceGroup, Target,
};

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// 把文件的修改时间往前调
fn backdate(path: &Path, age: Duration) -> Result<()> {
    let file = File::options().write(true).open(path)?;
    file.set_modified(SystemTime::now() - age)?;
    Ok(())
}

/// 创建示例目录：一个受保护文件、一个带关键字的受保护扩展名文件、一个普通文件和一个空目录
fn create_sample_root(root: &Path) -> Result<()> {
    for name in ["a.sav", "roblox_a.sav", "b.txt"] {
        let path = root.join(name);
        fs::write(&path, "content")?;
        backdate(&path, 2 * DAY)?;
    }
    fs::create_dir_all(root.join("empty"))?;
    Ok(())
}

fn sample_config(root: &Path) -> ReclaimConfig {
    ReclaimConfig {
        targets: vec![Target::new(root)],
        rules: ExclusionRules::new([".sav"], ["roblox"]),
        concurrency_limit: 8,
        grace_period: Duration::ZERO,
        retry_backoff: Duration::ZERO,
        progress_interval: Duration::from_millis(10),
        ..ReclaimConfig::default()
    }
}

/// 记录调用顺序的进程控制器
struct ScriptedProcesses {
    running: Vec<String>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedProcesses {
    fn running(names: &[&str]) -> Self {
        Self {
            running: names.iter().map(|n| n.to_string()).collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl ProcessController for ScriptedProcesses {
    fn is_running(&self, name: &str) -> bool {
        self.running.iter().any(|n| n.eq_ignore_ascii_case(name))
    }

    fn terminate(&self, name: &str) -> reclaimer_core::Result<()> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(name.to_string());
        }
        Ok(())
    }
}

#[test]
fn test_sample_root_main_pass_then_prune() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let root = temp_dir.path();
    create_sample_root(root)?;

    // 只执行主删除流程
    let config = ReclaimConfig {
        prune_empty_dirs: false,
        ..sample_config(root)
    };
    let main_pass = Reclaimer::new(config)?.run();

    assert_eq!(main_pass.stats.files_deleted, 2);
    assert_eq!(main_pass.stats.skipped, 1);
    assert_eq!(main_pass.stats.failed, 0);
    assert_eq!(main_pass.stats.folders_deleted, 0);
    assert!(root.join("a.sav").exists());
    assert!(!root.join("b.txt").exists());
    assert!(!root.join("roblox_a.sav").exists());
    assert!(root.join("empty").exists());

    // 完整流程：空目录在清理阶段被删除
    fs::write(root.join("b.txt"), "content")?;
    backdate(&root.join("b.txt"), 2 * DAY)?;
    let full = Reclaimer::new(sample_config(root))?.run();

    assert_eq!(full.stats.files_deleted, 1);
    assert_eq!(full.stats.skipped, 1);
    assert_eq!(full.stats.folders_deleted, 1);
    assert!(!root.join("empty").exists());
    assert_eq!(full.stats.accounted(), full.stats.dispatched);

    Ok(())
}

#[test]
fn test_force_mode_removes_everything_unprotected() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let root = temp_dir.path();
    create_sample_root(root)?;
    fs::write(root.join("fresh.log"), "just written")?;

    let config = ReclaimConfig {
        force: true,
        ..sample_config(root)
    };
    let summary = Reclaimer::new(config)?.run();

    assert_eq!(summary.stats.files_deleted, 3);
    assert_eq!(summary.stats.folders_deleted, 1);
    assert_eq!(summary.stats.skipped, 1);
    assert_eq!(summary.stats.failed, 0);
    assert!(!root.join("empty").exists());
    assert!(root.join("a.sav").exists());

    Ok(())
}

#[test]
fn test_protected_bundle_survives_full_run() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let root = temp_dir.path();
    let vm = root.join("VirtualBox VMs").join("dev");
    fs::create_dir_all(vm.join("Logs"))?;
    fs::write(vm.join("dev.vdi"), "disk")?;
    fs::write(vm.join("dev.vbox"), "config")?;
    fs::write(vm.join("Logs").join("VBox.log"), "log")?;
    fs::create_dir_all(root.join("cache").join("nested"))?;
    fs::write(root.join("cache").join("nested").join("blob"), "x")?;

    let config = ReclaimConfig {
        force: true,
        rules: ExclusionRules::new([".vdi", ".vbox"], ["roblox"]),
        ..sample_config(root)
    };
    let summary = Reclaimer::new(config)?.run();

    assert!(vm.join("dev.vdi").exists());
    assert!(vm.join("dev.vbox").exists());
    assert!(vm.join("Logs").join("VBox.log").exists());
    assert!(!root.join("cache").exists());
    assert_eq!(summary.stats.failed, 0);
    assert_eq!(summary.stats.accounted(), summary.stats.dispatched);

    Ok(())
}

#[test]
fn test_conservation_over_large_tree() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let root = temp_dir.path();

    for d in 0..10 {
        let dir = root.join(format!("dir_{d}")).join("sub");
        fs::create_dir_all(&dir)?;
        for f in 0..20 {
            let name = match f {
                0 if d % 3 == 0 => format!("save_{f}.sav"),
                1 if d % 3 == 0 => format!("roblox_{f}.sav"),
                _ => format!("file_{f}.tmp"),
            };
            fs::write(dir.join(name), "x")?;
        }
    }

    let config = ReclaimConfig {
        force: true,
        concurrency_limit: 4,
        ..sample_config(root)
    };
    let summary = Reclaimer::new(config)?.run();

    assert_eq!(summary.stats.accounted(), summary.stats.dispatched);
    assert_eq!(summary.stats.failed, 0);
    assert!(root.join("dir_0").join("sub").join("save_0.sav").exists());
    assert!(!root.join("dir_1").exists());

    Ok(())
}

#[test]
fn test_missing_roots_degrade_to_empty() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config = ReclaimConfig {
        targets: vec![
            Target::new(temp_dir.path().join("does-not-exist")),
            Target::new(PathBuf::new()),
        ],
        resource_groups: vec![ResourceGroup::new(
            "ghost.exe",
            vec![temp_dir.path().join("ghost")],
        )],
        ..sample_config(temp_dir.path())
    };
    let summary = Reclaimer::new(config)?.run();

    assert_eq!(summary.stats.dispatched, 0);
    assert_eq!(summary.stats.accounted(), 0);

    Ok(())
}

#[test]
fn test_running_owner_respected_then_reclaimed_with_force() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let profile = temp_dir.path().join("Chrome").join("Default");
    let caches: Vec<PathBuf> = ["Cache", "Code Cache", "GPUCache"]
        .iter()
        .map(|name| profile.join(name))
        .collect();
    for cache in &caches {
        fs::create_dir_all(cache)?;
        fs::write(cache.join("data"), "x")?;
    }
    let group = ResourceGroup::new("chrome.exe", caches.clone());

    let base = ReclaimConfig {
        targets: Vec::new(),
        resource_groups: vec![group],
        ..sample_config(temp_dir.path())
    };

    let processes = Arc::new(ScriptedProcesses::running(&["chrome.exe"]));
    let respected =
        Reclaimer::with_collaborators(base.clone(), Arc::new(LocalFs), processes.clone())?.run();
    assert_eq!(respected.stats.dispatched, 0);
    assert!(caches.iter().all(|c| c.exists()));
    assert!(processes.calls().is_empty());

    let forced = ReclaimConfig {
        force: true,
        ..base
    };
    let reclaimed =
        Reclaimer::with_collaborators(forced, Arc::new(LocalFs), processes.clone())?.run();
    assert_eq!(processes.calls(), vec!["chrome.exe".to_string()]);
    assert_eq!(reclaimed.stats.folders_deleted, 3);
    assert!(caches.iter().all(|c| !c.exists()));

    Ok(())
}

#[test]
fn test_progress_events_end_with_summary() -> Result<()> {
    let temp_dir = TempDir::new()?;
    create_sample_root(temp_dir.path())?;

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let summary =
        Reclaimer::new(sample_config(temp_dir.path()))?.run_with_progress(move |event| {
            if let Ok(mut events) = sink.lock() {
                events.push(event);
            }
        });

    let events = events.lock().map(|e| e.clone()).unwrap_or_default();
    let last = events.last().copied();
    assert_eq!(last.map(|e| e.phase), Some(ReclaimPhase::Complete));
    assert_eq!(last.map(|e| e.snapshot), Some(summary.stats));

    // 计数单调不减
    let totals: Vec<u64> = events.iter().map(|e| e.snapshot.accounted()).collect();
    assert!(totals.windows(2).all(|w| w[0] <= w[1]));

    Ok(())
}
