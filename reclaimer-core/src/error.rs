use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// 回收过程中的错误分类
#[derive(Debug, Error)]
pub enum ReclaimError {
    /// 条目在枚举之后、处理之前消失
    #[error("路径不存在: {0:?}")]
    NotFound(PathBuf),

    /// 条目（或目录中的某个文件）受排除规则保护
    #[error("路径受排除规则保护: {0:?}")]
    Excluded(PathBuf),

    /// 文件正被其他进程占用
    #[error("文件正在使用中: {0:?}")]
    Locked(PathBuf),

    #[error("删除失败 {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// 无法终止占用资源组的进程，整个资源组被放弃
    #[error("无法终止进程 {name}: {reason}")]
    ProcessTermination { name: String, reason: String },

    #[error("无效的配置: {0}")]
    InvalidConfig(String),

    #[error("创建工作线程池失败: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

impl ReclaimError {
    /// 将底层 IO 错误归类，`NotFound` 单独处理
    pub fn from_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        if source.kind() == io::ErrorKind::NotFound {
            ReclaimError::NotFound(path)
        } else {
            ReclaimError::Io { path, source }
        }
    }

    /// 该错误对应的计数结果
    pub fn outcome(&self) -> Outcome {
        match self {
            ReclaimError::NotFound(_) | ReclaimError::Excluded(_) | ReclaimError::Locked(_) => {
                Outcome::Skipped
            }
            _ => Outcome::Failed,
        }
    }
}

pub type Result<T> = std::result::Result<T, ReclaimError>;

/// 单个候选条目的最终结果，每个条目恰好记录一次
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    FileDeleted,
    FolderDeleted,
    Skipped,
    Failed,
}
