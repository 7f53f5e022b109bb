//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `LOOPER__*` 覆盖（双下划线表示嵌套，如 `LOOPER__RESEARCH__DEEP_BUDGET=6`）。

use std::path::PathBuf;

use serde::Deserialize;

use crate::privacy::PrivacyLevel;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub research: ResearchSection,
    pub evaluator: EvaluatorSection,
    pub providers: ProvidersSection,
    pub privacy: PrivacySection,
}

/// [app] 段
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    pub name: Option<String>,
}

/// [research] 段：迭代预算、深读数量、输出来源数量、停止阈值
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResearchSection {
    pub fast_budget: usize,
    pub deep_budget: usize,
    pub read_top_n: usize,
    pub sources_top_n: usize,
    pub satisfaction_threshold: f64,
}

impl Default for ResearchSection {
    fn default() -> Self {
        Self {
            fast_budget: 2,
            deep_budget: 4,
            read_top_n: 2,
            sources_top_n: 3,
            satisfaction_threshold: 0.85,
        }
    }
}

/// [evaluator] 段：词数阈值与各档满意度
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EvaluatorSection {
    pub low_words: usize,
    pub high_words: usize,
    pub empty_score: f64,
    pub low_score: f64,
    pub medium_score: f64,
    pub high_score: f64,
}

impl Default for EvaluatorSection {
    fn default() -> Self {
        Self {
            low_words: 500,
            high_words: 1000,
            empty_score: 0.0,
            low_score: 0.3,
            medium_score: 0.6,
            high_score: 0.9,
        }
    }
}

/// [providers] 段：单次调用超时、搜索与阅读子段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProvidersSection {
    pub timeout_secs: u64,
    pub search: SearchSection,
    pub reader: ReaderSection,
}

impl Default for ProvidersSection {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            search: SearchSection::default(),
            reader: ReaderSection::default(),
        }
    }
}

/// [providers.search] 段：SearxNG 兼容接口地址与默认 breadth
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchSection {
    pub endpoint: Option<String>,
    pub default_breadth: usize,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            endpoint: None,
            default_breadth: 5,
        }
    }
}

/// [providers.reader] 段：正文最大字符数与域名白名单（空表示不限制）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReaderSection {
    pub max_result_chars: usize,
    pub allowed_domains: Vec<String>,
}

impl Default for ReaderSection {
    fn default() -> Self {
        Self {
            max_result_chars: 20_000,
            allowed_domains: Vec::new(),
        }
    }
}

/// [privacy] 段
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct PrivacySection {
    pub level: PrivacyLevel,
}

/// 从 config 目录加载配置，环境变量 LOOPER__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 LOOPER__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("LOOPER")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
