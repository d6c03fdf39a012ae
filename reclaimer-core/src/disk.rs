use serde::Serialize;
use std::path::{Path, PathBuf};
use sysinfo::Disks;
use tracing::debug;

/// 一个卷在某一时刻的空间
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiskSpace {
    pub mount_point: PathBuf,
    pub total: u64,
    pub available: u64,
}

impl DiskSpace {
    pub fn used(&self) -> u64 {
        self.total.saturating_sub(self.available)
    }

    /// 可用空间占比（0-100）
    pub fn available_percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.available as f64 / self.total as f64 * 100.0
    }
}

/// 同一个卷在回收前后的空间
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VolumeChange {
    pub mount_point: PathBuf,
    pub total: u64,
    pub available_before: u64,
    pub available_after: u64,
}

impl VolumeChange {
    /// 可用空间的变化量，其他程序同时写盘时可能为负
    pub fn reclaimed(&self) -> i64 {
        (self.available_after as i64).saturating_sub(self.available_before as i64)
    }

    /// 回收后的状态
    pub fn after(&self) -> DiskSpace {
        DiskSpace {
            mount_point: self.mount_point.clone(),
            total: self.total,
            available: self.available_after,
        }
    }
}

/// 查询 `paths` 所在的卷，每个卷只出现一次
///
/// 找不到所在卷的路径被忽略。
pub fn volumes_for<P: AsRef<Path>>(paths: &[P]) -> Vec<DiskSpace> {
    let disks = Disks::new_with_refreshed_list();
    let all: Vec<DiskSpace> = disks
        .list()
        .iter()
        .map(|disk| DiskSpace {
            mount_point: disk.mount_point().to_path_buf(),
            total: disk.total_space(),
            available: disk.available_space(),
        })
        .collect();
    select_volumes(&all, paths)
}

/// 为每个路径选挂载点最长的那个卷
fn select_volumes<P: AsRef<Path>>(disks: &[DiskSpace], paths: &[P]) -> Vec<DiskSpace> {
    let mut selected: Vec<DiskSpace> = Vec::new();

    for path in paths {
        let path = path.as_ref();
        let path = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        let Some(disk) = disks
            .iter()
            .filter(|disk| path.starts_with(&disk.mount_point))
            .max_by_key(|disk| disk.mount_point.components().count())
        else {
            debug!("找不到 {:?} 所在的卷", path);
            continue;
        };

        if !selected.iter().any(|s| s.mount_point == disk.mount_point) {
            selected.push(disk.clone());
        }
    }

    selected
}

/// 按挂载点配对前后两次查询，只出现在一侧的卷被丢弃
pub fn compare(before: &[DiskSpace], after: &[DiskSpace]) -> Vec<VolumeChange> {
    before
        .iter()
        .filter_map(|old| {
            let new = after.iter().find(|d| d.mount_point == old.mount_point)?;
            Some(VolumeChange {
                mount_point: old.mount_point.clone(),
                total: new.total,
                available_before: old.available,
                available_after: new.available,
            })
        })
        .collect()
}
