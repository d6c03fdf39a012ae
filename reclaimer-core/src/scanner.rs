use std::cmp::Reverse;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::fs::{FileSystem, LocalFs};
use crate::target::CandidateItem;

/// 路径枚举器：列出根目录下的全部后代
pub struct PathEnumerator {
    fs: Arc<dyn FileSystem>,
}

impl PathEnumerator {
    /// 创建新的枚举器
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }

    /// 枚举根目录下的所有文件和目录（不含根目录本身）
    ///
    /// 根目录不存在时返回空列表；无法访问的子树会被跳过，不会中断整个枚举。
    pub fn enumerate<P: AsRef<Path>>(&self, root: P) -> Vec<CandidateItem> {
        let root = root.as_ref();

        if let Err(e) = self.fs.stat(root) {
            debug!("目录不存在或无法访问 {:?}: {}", root, e);
            return Vec::new();
        }

        let items = self.fs.walk(root);
        info!("在 {:?} 下找到 {} 个条目", root, items.len());
        items
    }

    /// 按深度排序（最深的在前）
    ///
    /// 深度相同的条目之间不保证特定顺序，但对已排序的序列再次排序不会改变它。
    pub fn sort_by_depth(mut items: Vec<CandidateItem>) -> Vec<CandidateItem> {
        items.sort_by_key(|item| Reverse(item.depth));
        items
    }
}

impl Default for PathEnumerator {
    fn default() -> Self {
        Self::new(Arc::new(LocalFs))
    }
}
