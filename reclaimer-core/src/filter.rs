use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info};

use crate::fs::FileSystem;
use crate::target::CandidateItem;

/// 排除规则：受保护的扩展名 + 覆盖关键字
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionRules {
    /// 小写、带前导点的扩展名，如 `.sav`
    pub extensions: BTreeSet<String>,
    /// 小写关键字，文件名包含任一关键字时解除扩展名保护
    pub override_keywords: Vec<String>,
}

impl ExclusionRules {
    pub fn new<E, K>(extensions: E, override_keywords: K) -> Self
    where
        E: IntoIterator,
        E::Item: AsRef<str>,
        K: IntoIterator,
        K::Item: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|ext| normalize_extension(ext.as_ref()))
                .collect(),
            override_keywords: override_keywords
                .into_iter()
                .map(|kw| kw.as_ref().to_lowercase())
                .filter(|kw| !kw.is_empty())
                .collect(),
        }
    }
}

fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().to_lowercase();
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{ext}")
    }
}

/// 排除过滤器
pub struct ExclusionFilter {
    rules: ExclusionRules,
}

impl ExclusionFilter {
    /// 创建新的过滤器
    pub fn new(rules: ExclusionRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &ExclusionRules {
        &self.rules
    }

    /// 判断路径是否受保护
    ///
    /// 扩展名不在排除集合中时不受保护；在集合中时，若文件名包含覆盖关键字则仍可删除。
    pub fn should_exclude(&self, path: &Path) -> bool {
        let Some(ext) = path.extension() else {
            return false;
        };
        let ext = format!(".{}", ext.to_string_lossy().to_lowercase());
        if !self.rules.extensions.contains(&ext) {
            return false;
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        match self
            .rules
            .override_keywords
            .iter()
            .find(|kw| name.contains(kw.as_str()))
        {
            Some(keyword) => {
                debug!(
                    "文件名包含关键字 '{}'，允许删除受保护扩展名的文件: {:?}",
                    keyword, path
                );
                false
            }
            None => true,
        }
    }

    /// 找出 `root` 之下所有包含受保护文件的目录（不含 `root` 本身）
    ///
    /// 这些目录整体跳过，其中其他文件也不会被单独删除。
    pub fn protected_dirs(&self, root: &Path, items: &[CandidateItem]) -> HashSet<PathBuf> {
        let mut dirs = HashSet::new();
        for item in items.iter().filter(|i| !i.is_dir) {
            if !self.should_exclude(&item.path) {
                continue;
            }
            for ancestor in item.path.ancestors().skip(1) {
                if ancestor == root || !ancestor.starts_with(root) {
                    break;
                }
                dirs.insert(ancestor.to_path_buf());
            }
        }
        dirs
    }

    /// 目录的子树中是否存在受保护的文件
    ///
    /// 只检查文件名，中间目录的名称不参与关键字匹配。
    pub fn subtree_protected(&self, fs: &dyn FileSystem, dir: &Path) -> bool {
        if self.rules.extensions.is_empty() {
            return false;
        }

        fs.walk(dir)
            .iter()
            .filter(|item| !item.is_dir)
            .any(|item| self.should_exclude(&item.path))
    }
}

/// 基于最后修改时间的过滤策略
#[derive(Debug, Clone, Copy)]
pub struct AgePolicy {
    force: bool,
    threshold: Duration,
    now: SystemTime,
}

impl AgePolicy {
    pub fn new(force: bool, threshold: Duration) -> Self {
        Self {
            force,
            threshold,
            now: SystemTime::now(),
        }
    }

    /// 使用指定的“当前时间”
    pub fn at(mut self, now: SystemTime) -> Self {
        self.now = now;
        self
    }

    /// 针对单个目标覆盖阈值
    pub fn with_override(mut self, threshold: Option<Duration>) -> Self {
        if let Some(threshold) = threshold {
            self.threshold = threshold;
        }
        self
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// 条目是否足够旧，可以进入删除流程
    pub fn is_eligible(&self, modified: Option<SystemTime>) -> bool {
        if self.force {
            return true;
        }

        let Some(modified) = modified else {
            // 没有修改时间，保守起见保留
            return false;
        };

        match self.now.duration_since(modified) {
            Ok(elapsed) => elapsed > self.threshold,
            // 修改时间在未来，保留
            Err(_) => false,
        }
    }

    /// 过滤掉还不够旧的候选条目
    ///
    /// 包含较新条目的目录也会被保留，避免递归删除时连带删除它们。
    pub fn filter_candidates(&self, items: Vec<CandidateItem>) -> Vec<CandidateItem> {
        if self.force {
            return items;
        }

        let original_count = items.len();
        let (mut eligible, recent): (Vec<CandidateItem>, Vec<CandidateItem>) = items
            .into_iter()
            .partition(|item| self.is_eligible(item.modified));

        let holding: HashSet<&Path> = recent
            .iter()
            .flat_map(|item| item.path.ancestors().skip(1))
            .collect();
        eligible.retain(|item| !(item.is_dir && holding.contains(item.path.as_path())));

        let kept = original_count - eligible.len();
        if kept > 0 {
            info!(
                "时间过滤器保留了 {} 个条目（修改时间在 {} 小时内）",
                kept,
                self.threshold.as_secs() / 3600
            );
        }

        eligible
    }
}
