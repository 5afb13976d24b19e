mod commands;
mod descriptor;
mod pipeline;

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tfrestore")]
#[command(about = "記録済みのステートからTerraform管理のインフラを復元", long_about = None)]
struct Cli {
    /// デバッグログを出力（RUST_LOG が優先）
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 以前のステートを注入してインフラを再適用
    Restore {
        /// リソース記述ファイル (YAML)
        #[arg(short, long)]
        descriptor: PathBuf,
        /// 設定ファイル（デフォルト: 自動検索）
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// 復元レポートの出力先（デフォルト: 標準出力）
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// 適用せずにチャートを展開
    Render {
        /// リソース記述ファイル (YAML)
        #[arg(short, long)]
        descriptor: PathBuf,
        /// 設定ファイル（デフォルト: 自動検索）
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// 展開したファイルをこのディレクトリにも書き出す
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// 保存済みステートをデコードして概要を表示
    InspectState {
        /// ステートファイル
        file: PathBuf,
    },
    /// バージョン情報を表示
    Version,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.command {
        Commands::Restore {
            descriptor,
            config,
            output,
        } => {
            commands::restore::handle(&descriptor, config.as_deref(), output.as_deref()).await
        }
        Commands::Render {
            descriptor,
            config,
            output_dir,
        } => commands::render::handle(&descriptor, config.as_deref(), output_dir.as_deref()).await,
        Commands::InspectState { file } => {
            commands::inspect_state::handle(&file)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Version => {
            println!("tfrestore {}", env!("CARGO_PKG_VERSION"));
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "✗".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
