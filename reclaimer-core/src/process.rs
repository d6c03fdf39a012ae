use sysinfo::{Process, ProcessesToUpdate, System};
use tracing::{debug, info};

use crate::error::{ReclaimError, Result};

/// 按可执行文件名查询、终止进程
pub trait ProcessController: Send + Sync {
    /// 是否有同名进程正在运行（不区分大小写）
    fn is_running(&self, name: &str) -> bool;

    /// 终止所有同名进程；没有匹配的进程时视为成功
    fn terminate(&self, name: &str) -> Result<()>;
}

/// 基于 `sysinfo` 进程快照的控制器
///
/// 比较进程名时忽略大小写和 `.exe` 后缀，同一份配置在各平台上都能匹配。
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcessController;

impl SystemProcessController {
    pub fn new() -> Self {
        Self
    }

    fn snapshot() -> System {
        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::All, true);
        system
    }

    /// 快照中与 `name` 匹配的进程（不含线程）
    fn matching<'a>(system: &'a System, name: &str) -> Vec<&'a Process> {
        let key = process_key(name);
        system
            .processes()
            .values()
            .filter(|process| process.thread_kind().is_none())
            .filter(|process| Self::matches(process, &key))
            .collect()
    }

    fn matches(process: &Process, key: &str) -> bool {
        if process_key(&process.name().to_string_lossy()) == key {
            return true;
        }
        // Linux 上的进程名最多 15 个字节，再用可执行文件名比较一次
        process
            .exe()
            .and_then(|exe| exe.file_name())
            .is_some_and(|file| process_key(&file.to_string_lossy()) == key)
    }
}

/// 进程名的比较键：小写并去掉 `.exe` 后缀
///
/// 只在小写副本上截取，不会切到多字节字符中间。
fn process_key(name: &str) -> String {
    let lower = name.to_lowercase();
    match lower.strip_suffix(".exe") {
        Some(stem) => stem.to_string(),
        None => lower,
    }
}

impl ProcessController for SystemProcessController {
    fn is_running(&self, name: &str) -> bool {
        let system = Self::snapshot();
        let running = !Self::matching(&system, name).is_empty();
        debug!("进程 {} 运行中: {}", name, running);
        running
    }

    fn terminate(&self, name: &str) -> Result<()> {
        let system = Self::snapshot();
        let targets = Self::matching(&system, name);
        if targets.is_empty() {
            return Ok(());
        }

        let refused: Vec<String> = targets
            .iter()
            .filter(|process| !process.kill())
            .map(|process| process.pid().to_string())
            .collect();

        // 发送信号失败的进程可能已经自行退出，重新确认一次
        if !refused.is_empty() && self.is_running(name) {
            return Err(ReclaimError::ProcessTermination {
                name: name.to_string(),
                reason: format!("无法终止 PID {}", refused.join(", ")),
            });
        }

        info!("已终止进程 {} ({} 个实例)", name, targets.len());
        Ok(())
    }
}
