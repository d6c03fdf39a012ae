use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// 回收目标：一个根目录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub path: PathBuf,
    /// 覆盖全局的年龄阈值
    #[serde(default)]
    pub older_than: Option<Duration>,
}

impl Target {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            older_than: None,
        }
    }

    pub fn with_older_than(mut self, threshold: Duration) -> Self {
        self.older_than = Some(threshold);
        self
    }
}

/// 资源组：进程名及其运行时占用的目录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceGroup {
    pub process_name: String,
    pub directories: Vec<PathBuf>,
}

impl ResourceGroup {
    pub fn new<S: Into<String>>(process_name: S, directories: Vec<PathBuf>) -> Self {
        Self {
            process_name: process_name.into(),
            directories,
        }
    }
}

/// 一次回收中待处理的文件系统条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateItem {
    pub path: PathBuf,
    pub is_dir: bool,
    pub modified: Option<SystemTime>,
    pub depth: usize,
}

impl CandidateItem {
    pub fn new(path: PathBuf, is_dir: bool, modified: Option<SystemTime>) -> Self {
        let depth = path_depth(&path);
        Self {
            path,
            is_dir,
            modified,
            depth,
        }
    }
}

/// 路径深度：路径中分隔符的个数
pub fn path_depth(path: &Path) -> usize {
    path.as_os_str()
        .to_string_lossy()
        .chars()
        .filter(|c| std::path::is_separator(*c))
        .count()
}
