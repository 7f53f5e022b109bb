//! Looper - 递归式网络研究智能体
//!
//! 入口：初始化日志、加载配置、组装提供方与研究循环，运行单次会话；
//! 进度里程碑输出到 stderr，最终答案输出到 stdout。Ctrl+C 取消会话并输出已有结果。

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use looper::config::load_config;
use looper::providers::{HttpReader, SearxSearchProvider};
use looper::{observability, Depth, ResearchLoop, ResearchRequest, Session, SynthesisResult};

#[derive(Debug, Parser)]
#[command(name = "looper", version, about = "Recursive web research: plan, search, read, evaluate, replan")]
struct Cli {
    /// 研究问题
    query: String,

    /// fast（2 轮）或 deep（4 轮）
    #[arg(long, default_value = "fast")]
    depth: Depth,

    /// 额外的配置文件（覆盖 config/default.toml）
    #[arg(long)]
    config: Option<PathBuf>,

    /// 覆盖 [providers.search] endpoint
    #[arg(long, env = "LOOPER_SEARCH_ENDPOINT")]
    endpoint: Option<String>,

    /// 以 JSON 输出结果
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();
    let cli = Cli::parse();

    let config = load_config(cli.config.clone()).context("Failed to load config")?;
    let Some(endpoint) = cli.endpoint.clone().or_else(|| config.providers.search.endpoint.clone()) else {
        bail!("No search endpoint configured: set [providers.search] endpoint or pass --endpoint");
    };

    let timeout = Duration::from_secs(config.providers.timeout_secs.max(1));
    let search = Arc::new(SearxSearchProvider::new(endpoint, timeout));
    let reader = Arc::new(HttpReader::new(
        config.providers.reader.allowed_domains.clone(),
        timeout,
        config.providers.reader.max_result_chars,
    ));
    let research = ResearchLoop::from_config(&config, search, reader).context("Invalid research config")?;

    let session = Session::new();
    let cancel = session.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let (event_tx, mut event_rx) = tokio::sync::mpsc::unbounded_channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            eprintln!("» {}", event);
        }
    });

    let request = ResearchRequest::new(cli.query.clone(), cli.depth);
    let outcome = research.run(session, request, Some(&event_tx)).await;
    drop(event_tx);
    let _ = printer.await;

    let result = outcome.context("Research failed")?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }
    Ok(())
}

fn print_result(result: &SynthesisResult) {
    println!("{}", result.answer);
    println!();
    println!("Confidence: {:.2}", result.confidence);
    if !result.sources.is_empty() {
        println!("Sources:");
        for (i, source) in result.sources.iter().enumerate() {
            println!("  [{}] {} <{}>", i + 1, source.title, source.url);
        }
    }
    if !result.alternatives.is_empty() {
        println!("Alternative viewpoints:");
        for alt in &result.alternatives {
            println!("  - {}: {} <{}>", alt.label, alt.description, alt.source_url);
        }
    }
}
