use anyhow::{Context, Result};
use reclaimer_core::{ExclusionRules, ReclaimConfig, ResourceGroup, Target};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 受保护的扩展名
const DEFAULT_EXCLUDED_EXTENSIONS: &[&str] = &[
    ".iso", ".vdi", ".sav", ".vbox", ".vbox-prev", ".vmdk", ".vhd", ".hdd", ".nvram", ".ova",
    ".ovf", ".vbox-extpack", ".vhdx", ".qcow2", ".img", ".lnk",
];

/// 文件名包含这些关键字时，受保护的扩展名也允许删除
const DEFAULT_OVERRIDE_KEYWORDS: &[&str] = &[
    "roblox",
    "paradox",
    "opera",
    "discord",
    "osu",
    "steam",
    "epic games",
];

/// 用户目录下的默认回收目标
const DEFAULT_HOME_TARGETS: &[&[&str]] = &[
    &["Downloads"],
    &["Documents"],
    &["Desktop"],
    &["Videos"],
    &["Music"],
    &["Pictures"],
    &["3D Objects"],
    &["Saved Games"],
    &["Contacts"],
    &["Links"],
    &["Favorites"],
    &["AppData", "Local", "Temp"],
    &["AppData", "Roaming", "Microsoft", "Windows", "Recent"],
    &["AppData", "Local", "Low", "Microsoft", "Internet Explorer"],
    &["AppData", "Local", "Microsoft", "Windows", "INetCache"],
    &["AppData", "Local", "Microsoft", "Windows", "INetCookies"],
    &["AppData", "Roaming", "Microsoft", "Office", "Recent"],
    &["AppData", "Local", "Microsoft", "Windows", "Clipboard"],
    &[".cache"],
    &["AppData", "Local", "Roblox"],
    &["AppData", "Roaming", "Microsoft", "Windows", "Start Menu", "Programs", "Roblox"],
    &["AppData", "Roaming", "Microsoft", "Windows", "Start Menu", "Programs", "Discord Inc"],
    &["AppData", "Local", "Discord"],
    &["AppData", "Roaming", "Microsoft", "Windows", "Start Menu", "Programs", "osu!.lnk"],
    &["AppData", "Local", "osu!"],
    &["AppData", "Roaming", "Microsoft", "Windows", "Start Menu", "Programs", "Paradox Interactive"],
    &["AppData", "Local", "Programs", "Paradox Interactive"],
    &["MicrosoftEdgeBackups"],
    &["AppData", "Roaming", "Godot"],
];

/// 浏览器等常驻进程占用的目录
const DEFAULT_RESOURCE_GROUPS: &[(&str, &[&[&str]])] = &[
    (
        "firefox.exe",
        &[
            &["AppData", "Roaming", "Mozilla", "Firefox", "Profiles"],
            &["AppData", "Local", "Mozilla", "Firefox", "Profiles"],
            &["AppData", "Roaming", "Mozilla", "Firefox", "profiles.ini"],
        ],
    ),
    (
        "chrome.exe",
        &[&["AppData", "Local", "Google", "Chrome", "User Data"]],
    ),
    (
        "msedge.exe",
        &[&["AppData", "Local", "Microsoft", "Edge", "User Data"]],
    ),
    (
        "opera.exe",
        &[
            &["AppData", "Roaming", "Opera Software"],
            &["AppData", "Local", "Opera Software"],
            &["AppData", "Local", "Programs", "Opera GX"],
        ],
    ),
    (
        "onedrive.exe",
        &[&["AppData", "Local", "Microsoft", "OneDrive"]],
    ),
];

/// 单个回收目标的配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSetting {
    pub path: PathBuf,
    /// 覆盖全局的年龄阈值（小时）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub older_than_hours: Option<u64>,
}

/// 配置文件内容
///
/// 缺省的字段取内置默认值。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub older_than_hours: u64,
    pub concurrency: usize,
    pub prune_empty_dirs: bool,

    // 资源组选项
    pub grace_period_ms: u64,
    pub retry_backoff_ms: u64,

    pub progress_interval_ms: u64,

    // 排除规则
    pub excluded_extensions: Vec<String>,
    pub override_keywords: Vec<String>,

    pub targets: Vec<TargetSetting>,
    pub resource_groups: Vec<ResourceGroup>,
}

impl Default for Settings {
    fn default() -> Self {
        Self::with_home(dirs::home_dir().as_deref())
    }
}

impl Settings {
    /// 以指定的用户目录构建默认配置；没有用户目录时目标列表为空
    pub fn with_home(home: Option<&Path>) -> Self {
        if home.is_none() {
            tracing::warn!("找不到用户目录，默认目标和资源组为空");
        }

        let join =|parts: &[&str]| -> Option<PathBuf> {
            let home = home?;
            Some(parts.iter().fold(home.to_path_buf(), |path, part| path.join(part)))
        };

        let mut targets: Vec<TargetSetting> = DEFAULT_HOME_TARGETS
            .iter()
            .filter_map(|parts| join(*parts))
            .map(|path| TargetSetting {
                path,
                older_than_hours: None,
            })
            .collect();

        // 仅在 Windows 上存在的系统目录
        for (var, parts) in [
            ("ProgramFiles(x86)", &["Epic Games"][..]),
            ("ProgramData", &["Riot Games"][..]),
        ] {
            if let Some(base) = std::env::var_os(var) {
                let path = parts.iter().fold(PathBuf::from(base), |p, part| p.join(part));
                targets.push(TargetSetting {
                    path,
                    older_than_hours: None,
                });
            }
        }

        let resource_groups = if home.is_some() {
            DEFAULT_RESOURCE_GROUPS
                .iter()
                .map(|(name, paths)| {
                    ResourceGroup::new(*name, paths.iter().filter_map(|parts| join(*parts)).collect())
                })
                .collect()
        } else {
            Vec::new()
        };

        Self {
            older_than_hours: 24,
            concurrency: 500,
            prune_empty_dirs: true,

            grace_period_ms: 1000,
            retry_backoff_ms: 1000,

            progress_interval_ms: 50,

            excluded_extensions: DEFAULT_EXCLUDED_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            override_keywords: DEFAULT_OVERRIDE_KEYWORDS
                .iter()
                .map(|s| s.to_string())
                .collect(),

            targets,
            resource_groups,
        }
    }

    /// 获取默认配置文件路径
    pub fn config_file_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("reclaimer").join("config.toml"))
    }

    /// 加载配置
    ///
    /// 显式指定的文件必须存在且有效；默认位置的文件不存在或无效时使用内置默认值。
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_file(path);
        }

        if let Some(config_path) = Self::config_file_path() {
            if config_path.exists() {
                match Self::load_from_file(&config_path) {
                    Ok(settings) => return Ok(settings),
                    Err(e) => tracing::warn!("忽略无效的配置文件: {:#}", e),
                }
            }
        }

        tracing::info!("使用默认配置");
        Ok(Self::default())
    }

    /// 从指定文件加载
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("无法读取配置文件: {}", path.display()))?;
        let settings = toml::from_str::<Settings>(&content)
            .with_context(|| format!("无法解析配置文件: {}", path.display()))?;
        tracing::info!("已加载配置文件: {:?}", path);
        Ok(settings)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("无法序列化配置")
    }

    /// 转换为回收器配置
    pub fn to_reclaim_config(&self) -> ReclaimConfig {
        ReclaimConfig {
            targets: self
                .targets
                .iter()
                .map(|t| {
                    let target = Target::new(&t.path);
                    match t.older_than_hours {
                        Some(hours) => target.with_older_than(hours_to_duration(hours)),
                        None => target,
                    }
                })
                .collect(),
            rules: ExclusionRules::new(&self.excluded_extensions, &self.override_keywords),
            resource_groups: self.resource_groups.clone(),
            force: false,
            age_threshold: hours_to_duration(self.older_than_hours),
            concurrency_limit: self.concurrency,
            grace_period: Duration::from_millis(self.grace_period_ms),
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
            progress_interval: Duration::from_millis(self.progress_interval_ms),
            prune_empty_dirs: self.prune_empty_dirs,
        }
    }
}

pub fn hours_to_duration(hours: u64) -> Duration {
    Duration::from_secs(hours.saturating_mul(60 * 60))
}
