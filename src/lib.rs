//! Looper - 递归式网络研究智能体
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、会话生命周期、循环阶段
//! - **observability**: 日志初始化
//! - **privacy**: 查询匿名化（分级遮蔽）
//! - **providers**: 搜索 / 正文阅读接口、超时执行器、HTTP 与内存实现
//! - **research**: 意图分类、Planner、Context Store、Evaluator、Synthesizer、主循环

pub mod config;
pub mod core;
pub mod observability;
pub mod privacy;
pub mod providers;
pub mod research;

pub use crate::core::{ResearchError, Session};
pub use research::{Depth, ResearchEvent, ResearchLoop, ResearchRequest, SynthesisResult};
