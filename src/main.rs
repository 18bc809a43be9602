//! cloze-reading 命令行入口
//! 读取本地 HTML 文件或抓取 URL，生成完形填空并输出改写后的页面。

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{info, warn};

use cloze_reading::config::{ProviderKind, Settings};
use cloze_reading::dom::Dom;
use cloze_reading::extract::quick_detect_content;
use cloze_reading::i18n::Lang;
use cloze_reading::message::Request;
use cloze_reading::service::BackgroundService;
use cloze_reading::session::Session;

#[derive(Parser, Debug)]
#[command(name = "cloze-reading")]
#[command(about = "网页完形填空阅读训练", long_about = None)]
struct Args {
    /// HTML 文件路径或 http(s) URL
    input: Option<String>,

    /// 输出文件（缺省输出到 stdout）
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    output: Option<PathBuf>,

    /// API 提供者: ollama / dashscope / google
    #[arg(long)]
    provider: Option<ProviderKind>,

    /// 覆盖当前提供者的模型名
    #[arg(long)]
    model: Option<String>,

    /// 界面语言: zh / en
    #[arg(long)]
    lang: Option<String>,

    /// 配置文件路径（缺省使用平台配置目录）
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// 只检查提供者连接状态
    #[arg(long)]
    check: bool,

    /// 输出调试日志
    #[arg(short, long)]
    verbose: bool,
}

fn setup_logger(verbose: bool) -> Result<(), fern::InitError> {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}] {}",
                chrono::Local::now().format("%H:%M:%S"),
                record.level(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr())
        .apply()?;
    Ok(())
}

/// 按输入形态读取页面内容
async fn load_input(input: &str) -> Result<String> {
    if input.starts_with("http://") || input.starts_with("https://") {
        let response = reqwest::get(input)
            .await
            .with_context(|| format!("抓取页面失败: {}", input))?;
        if !response.status().is_success() {
            bail!("抓取页面失败: {} -> HTTP {}", input, response.status());
        }
        Ok(response.text().await?)
    } else {
        std::fs::read_to_string(input).with_context(|| format!("读取文件失败: {}", input))
    }
}

fn apply_overrides(settings: &mut Settings, args: &Args) -> Result<()> {
    if let Some(provider) = args.provider {
        settings.provider = provider;
    }
    if let Some(model) = &args.model {
        match settings.provider {
            ProviderKind::Ollama => settings.ollama_model = model.clone(),
            ProviderKind::Dashscope => settings.dashscope_model = model.clone(),
            ProviderKind::Google => settings.google_model = model.clone(),
        }
    }
    if let Some(lang) = &args.lang {
        settings.language = match lang.to_lowercase().as_str() {
            "zh" => Lang::Zh,
            "en" => Lang::En,
            other => bail!("不支持的语言: {}", other),
        };
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    setup_logger(args.verbose).context("初始化日志失败")?;

    let mut settings = Settings::load(args.config.as_deref())?;
    apply_overrides(&mut settings, &args)?;

    let service = BackgroundService::new(settings.clone());

    if args.check {
        let response = service
            .dispatch(Request::CheckApiStatus {
                model: settings.model().to_string(),
            })
            .await?;
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    let input = args
        .input
        .as_deref()
        .context("缺少输入：HTML 文件路径或 URL（--check 可单独检查连接）")?;
    let html = load_input(input).await?;
    let dom = Dom::parse(&html);

    if !quick_detect_content(&dom) {
        warn!("页面未检测到明显正文，仍尝试提取");
    }

    let mut session = Session::attach(dom, settings)?;
    let summary = session.run_generation(&service).await?;
    info!(
        "生成完成: 成功 {}/{}（耗时 {:.1} 秒）",
        summary.success, summary.total, summary.seconds
    );

    let annotated = session.dom().to_html();
    match &args.output {
        Some(path) => {
            std::fs::write(path, annotated)
                .with_context(|| format!("写入输出失败: {}", path.display()))?;
            info!("已写入 {}", path.display());
        }
        None => println!("{}", annotated),
    }
    Ok(())
}
