use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::error;
use vfx_breakdown::api::{self, ScriptStats};
use vfx_breakdown::{BreakdownResult, Conf, ExportMode};

#[derive(Parser)]
#[command(name = "script-breakdown")]
#[command(about = "剧本VFX拆解工具 - 解析剧本、统计镜头并导出表格")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 配置文件(JSON)，不指定时使用默认配置
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Csv,
    Xlsx,
}

#[derive(Subcommand)]
enum Commands {
    /// 解析剧本并输出摘要
    Parse {
        /// 剧本文件
        file: PathBuf,

        /// 输出完整的JSON解析结果
        #[arg(long)]
        json: bool,
    },

    /// 统计场景、页数和VFX标注
    Stats {
        file: PathBuf,
    },

    /// 导出拆解表格
    Export {
        file: PathBuf,

        /// 输出文件
        #[arg(short, long)]
        output: PathBuf,

        #[arg(short, long, value_enum, default_value = "csv")]
        format: Format,

        /// 导出全部块，而不只是带VFX标注的块
        #[arg(long)]
        full: bool,
    },

    /// 重新写出剧本文本
    Serialize {
        file: PathBuf,

        /// 去掉全部标注
        #[arg(long)]
        clean: bool,

        /// 输出文件(默认打印到标准输出)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// 拼接逐页OCR文本
    JoinPages {
        /// 按页顺序排列的文本文件
        #[arg(required = true)]
        pages: Vec<PathBuf>,

        #[arg(short, long)]
        output: PathBuf,
    },
}

fn load_conf(path: Option<&Path>) -> BreakdownResult<Conf> {
    match path {
        Some(path) => Conf::load(path),
        None => Ok(Conf::default()),
    }
}

fn print_stats(stats: &ScriptStats) {
    println!("场景数量: {}", stats.scenes);
    println!("页数: {} (估算长度 {} 页)", stats.pages, stats.length.label);
    println!("动作块: {}", stats.action_blocks);
    println!("对白块: {}", stats.dialogue_blocks);
    println!("实体数量: {}", stats.entities);
    println!("VFX标注: {}", stats.vfx_total());
    for (level, count) in &stats.vfx_by_level {
        println!("  {}: {}", level, count);
    }
}

async fn run(cli: Cli) -> BreakdownResult<()> {
    let mut conf = load_conf(cli.config.as_deref())?;

    match cli.command {
        Commands::Parse { file, json } => {
            let content = fs::read_to_string(&file)?;
            if json {
                println!("{}", api::parse_script_json(content, conf).await?);
                return Ok(());
            }
            let result = api::parse_script(content, conf.clone()).await?;
            println!("解析完成！");
            println!("解析时间: {}ms", result.parse_time);
            println!("Token数量: {}", result.tokens.len());
            println!("实体数量: {}", result.entities.len());
            if !result.line_errors.is_empty() {
                println!("跳过的行: {}", result.line_errors.len());
                for err in &result.line_errors {
                    println!("  {}", err);
                }
            }
        }
        Commands::Stats { file } => {
            let content = fs::read_to_string(&file)?;
            let stats = api::script_stats(content, conf).await?;
            print_stats(&stats);
        }
        Commands::Export { file, output, format, full } => {
            if full {
                conf.export_mode = ExportMode::Full;
            }
            let content = fs::read_to_string(&file)?;
            let output = output.to_string_lossy().into_owned();
            let result = match format {
                Format::Csv => api::export_to_csv(content, output, conf).await,
                Format::Xlsx => api::export_to_xlsx(content, output, conf).await,
            };
            println!("{}", result.message);
            if let Some(path) = result.file_path {
                println!("已保存到: {}", path);
            }
        }
        Commands::Serialize { file, clean, output } => {
            let content = fs::read_to_string(&file)?;
            let script = api::export_raw_script(content, conf, clean).await?;
            match output {
                Some(path) => {
                    fs::write(&path, script)?;
                    println!("已保存到: {}", path.display());
                }
                None => print!("{}", script),
            }
        }
        Commands::JoinPages { pages, output } => {
            let texts = pages
                .iter()
                .map(fs::read_to_string)
                .collect::<Result<Vec<_>, _>>()?;
            fs::write(&output, api::join_ocr_pages(&texts))?;
            println!("{}页已拼接到: {}", texts.len(), output.display());
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
