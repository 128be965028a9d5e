use anyhow::Context;
use clap::Parser;
use mirrortools_lib::console::ConsoleReporter;
use mirrortools_lib::logging::{get_log_dir, LogConfig, SizeRotatingWriter};
use mirrortools_lib::{MirrorConfig, MirrorEngine};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio::sync::mpsc;
use tracing_subscriber::prelude::*;

/// 把 SUBSIDIARY 卷镜像为 MAIN 卷的内容
#[derive(Debug, Parser)]
#[command(name = "mirrortools", version, about)]
struct Cli {
    /// 扫描卷的根目录（默认 /Volumes）
    #[arg(long)]
    root: Option<PathBuf>,

    /// 直接指定源目录，跳过卷扫描（需同时指定 --dest）
    #[arg(long, requires = "dest")]
    source: Option<PathBuf>,

    /// 直接指定目标目录
    #[arg(long, requires = "source")]
    dest: Option<PathBuf>,

    /// 只输出计划执行的动作，不修改文件系统
    #[arg(long)]
    dry_run: bool,

    /// 配置文件（默认 <配置目录>/config.json）
    #[arg(long)]
    config: Option<PathBuf>,

    /// 同时把日志输出到终端
    #[arg(short, long)]
    verbose: bool,
}

/// 初始化日志系统
fn init_logging(config_file: &Path, log_dir: &Path, verbose: bool) {
    let config = LogConfig::load(config_file);

    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        config.tracing_level()
    };
    let env_filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

    let file_layer = if config.enabled {
        SizeRotatingWriter::new(log_dir, config.max_size_mb)
            .ok()
            .map(|writer| {
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_target(false)
            })
    } else {
        None
    };

    let console_layer = verbose.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
    });

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer);
    let _ = tracing::subscriber::set_global_default(subscriber);
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config_dir = mirrortools_lib::default_config_dir();
    let config_file = cli
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.json"));

    init_logging(&config_file, &get_log_dir(&config_dir), cli.verbose);

    let mut config = MirrorConfig::load_file(&config_file)?;
    if let Some(root) = cli.root {
        config.root = root;
    }
    config.dry_run |= cli.dry_run;

    if config.dry_run {
        println!("dry run: no changes will be made");
    }

    let engine = MirrorEngine::new(config);
    let (tx, rx) = mpsc::channel(256);
    let reporter = tokio::spawn(ConsoleReporter::stdout().drain(rx));

    let result = match (cli.source, cli.dest) {
        (Some(source), Some(dest)) => engine.mirror(&source, &dest, Some(tx)).await,
        _ => engine.run(Some(tx)).await,
    };

    reporter
        .await
        .context("console reporter task failed")?
        .context("failed to write console output")?;

    match result {
        Ok(report) => {
            tracing::info!("{}", serde_json::to_string(&report)?);
            if !report.errors.is_empty() {
                eprintln!("{} error(s) during mirroring", report.errors.len());
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => match e.missing_marker() {
            // 卷未连接：提示后退出，不做任何修改
            Some(marker) => {
                tracing::error!("{}", e);
                println!("Error: {} does not exist", marker);
                Ok(ExitCode::FAILURE)
            }
            None => Err(e.into()),
        },
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    match run(Cli::parse()).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
