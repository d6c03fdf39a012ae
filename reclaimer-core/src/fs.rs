use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;
use walkdir::WalkDir;

use crate::target::CandidateItem;

/// `stat` 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryMeta {
    pub is_dir: bool,
    /// 符号链接本身（`is_dir` 恒为 false）
    pub is_symlink: bool,
    pub modified: Option<SystemTime>,
}

/// 删除引擎依赖的文件系统原语
///
/// 所有删除操作都经过这个 trait，便于在测试中替换或记录调用。
pub trait FileSystem: Send + Sync {
    /// 查询条目元数据，不跟随符号链接
    fn stat(&self, path: &Path) -> io::Result<EntryMeta>;

    /// 列出目录的直接子条目
    fn list_children(&self, path: &Path) -> io::Result<Vec<PathBuf>>;

    /// 递归删除（文件则直接删除）
    fn remove_recursive(&self, path: &Path) -> io::Result<()>;

    /// 目录为空时删除，返回是否真的删除了
    ///
    /// 无法读取内容的目录不能确认为空，按非空处理。
    fn remove_if_empty(&self, path: &Path) -> io::Result<bool>;

    /// 尝试以读写方式打开文件，失败视为被占用
    fn try_open_read_write(&self, path: &Path) -> bool;

    /// 列出 `root` 的所有后代（不含 `root` 本身）
    ///
    /// 无法读取的子树会被静默跳过；`root` 不存在时返回空列表。
    fn walk(&self, root: &Path) -> Vec<CandidateItem> {
        let mut items = Vec::new();
        let mut pending = vec![root.to_path_buf()];

        while let Some(dir) = pending.pop() {
            let children = match self.list_children(&dir) {
                Ok(children) => children,
                Err(e) => {
                    debug!("跳过无法读取的目录 {:?}: {}", dir, e);
                    continue;
                }
            };

            for child in children {
                match self.stat(&child) {
                    Ok(meta) => {
                        if meta.is_dir {
                            pending.push(child.clone());
                        }
                        items.push(CandidateItem::new(child, meta.is_dir, meta.modified));
                    }
                    Err(e) => debug!("跳过无法访问的条目 {:?}: {}", child, e),
                }
            }
        }

        items
    }
}

/// 文件是否正在被占用
pub fn is_locked(fs: &dyn FileSystem, path: &Path) -> bool {
    !fs.try_open_read_write(path)
}

/// 本地文件系统
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFs;

impl FileSystem for LocalFs {
    fn stat(&self, path: &Path) -> io::Result<EntryMeta> {
        let metadata = fs::symlink_metadata(path)?;
        Ok(EntryMeta {
            is_dir: metadata.is_dir(),
            is_symlink: metadata.file_type().is_symlink(),
            modified: metadata.modified().ok(),
        })
    }

    fn list_children(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        fs::read_dir(path)?
            .map(|entry| entry.map(|e| e.path()))
            .collect()
    }

    fn remove_recursive(&self, path: &Path) -> io::Result<()> {
        let file_type = fs::symlink_metadata(path)?.file_type();
        if file_type.is_dir() {
            fs::remove_dir_all(path)
        } else if file_type.is_symlink() {
            // Windows 上指向目录的链接要用 remove_dir 删除
            fs::remove_file(path).or_else(|_| fs::remove_dir(path))
        } else {
            fs::remove_file(path)
        }
    }

    fn remove_if_empty(&self, path: &Path) -> io::Result<bool> {
        let mut entries = match fs::read_dir(path) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(e),
            Err(e) => {
                debug!("无法读取目录 {:?}，按非空处理: {}", path, e);
                return Ok(false);
            }
        };
        if entries.next().is_some() {
            return Ok(false);
        }
        fs::remove_dir(path)?;
        Ok(true)
    }

    fn try_open_read_write(&self, path: &Path) -> bool {
        fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .is_ok()
    }

    fn walk(&self, root: &Path) -> Vec<CandidateItem> {
        WalkDir::new(root)
            .min_depth(1)
            .follow_links(false)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    debug!("遍历错误，跳过: {}", e);
                    None
                }
            })
            .map(|entry| {
                let is_dir = entry.file_type().is_dir();
                let modified = entry.metadata().ok().and_then(|m| m.modified().ok());
                CandidateItem::new(entry.into_path(), is_dir, modified)
            })
            .collect()
    }
}
