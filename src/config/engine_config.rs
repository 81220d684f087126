// ==========================================
// 住宅选配规则引擎 - 引擎配置
// ==========================================
// 存储: JSON 文件 (默认 <config_dir>/home-config-engine/engine.json)
// 缺省: 文件不存在时使用内置默认值
// ==========================================

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// 配置默认文件名
pub const CONFIG_FILE_NAME: &str = "engine.json";

/// 配置目录名
pub const CONFIG_DIR_NAME: &str = "home-config-engine";

/// 配置层错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("配置文件读取失败: {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("配置解析失败: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("配置值无效: {0}")]
    Invalid(String),
}

// ==========================================
// PropagationConfig - 规则传播配置
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropagationConfig {
    /// 最大迭代轮数; None 时按树规模 (choices + points + 1) 推导
    #[serde(default)]
    pub max_passes: Option<usize>,
}

// ==========================================
// PriceRangeConfig - 价格区间枚举配置
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRangeConfig {
    /// 单个 Choice 最多枚举的组合数, 超出后返回近似区间
    #[serde(default = "default_max_permutations")]
    pub max_permutations: usize,
    /// 相关集合规模上限, 超出直接拒绝
    #[serde(default = "default_max_relevant_set")]
    pub max_relevant_set: usize,
}

fn default_max_permutations() -> usize {
    65_536
}

fn default_max_relevant_set() -> usize {
    24
}

impl Default for PriceRangeConfig {
    fn default() -> Self {
        Self {
            max_permutations: default_max_permutations(),
            max_relevant_set: default_max_relevant_set(),
        }
    }
}

// ==========================================
// MonotonyConfig - 单调性检测配置
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonotonyConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Default for MonotonyConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

// ==========================================
// EngineConfig - 引擎总配置
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub propagation: PropagationConfig,
    #[serde(default)]
    pub price_range: PriceRangeConfig,
    #[serde(default)]
    pub monotony: MonotonyConfig,
}

impl EngineConfig {
    /// 从 JSON 字符串解析并校验
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// 从文件加载
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// 从文件加载, 文件不存在时使用默认值
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!("配置文件不存在, 使用默认配置: {}", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// 默认配置文件路径
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.price_range.max_permutations == 0 {
            return Err(ConfigError::Invalid(
                "price_range.max_permutations 必须大于 0".to_string(),
            ));
        }
        // 组合数以 u64 位掩码枚举
        if self.price_range.max_relevant_set > 63 {
            return Err(ConfigError::Invalid(format!(
                "price_range.max_relevant_set 不得超过 63 (当前 {})",
                self.price_range.max_relevant_set
            )));
        }
        if self.propagation.max_passes == Some(0) {
            return Err(ConfigError::Invalid(
                "propagation.max_passes 必须大于 0".to_string(),
            ));
        }
        Ok(())
    }
}
