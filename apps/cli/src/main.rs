//! # RoboPi CLI
//!
//! Command-line interface for RoboPi robot control.
//!
//! ## 双模式架构
//!
//! ### One-shot 模式（推荐用于脚本）
//!
//! ```bash
//! # 配置默认主机
//! robopi-cli config set --host 192.168.1.42
//!
//! # 执行操作（内部：连接 -> 运动 -> 断开）
//! robopi-cli drive FWD ROTATE_LEFT STOP
//! robopi-cli picture -o shot.jpg
//! ```
//!
//! ### REPL 模式（推荐用于调试）
//!
//! ```bash
//! $ robopi-cli shell
//! robopi> connect 192.168.1.42
//! robopi> fwd
//! robopi> stop
//! robopi> exit
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod modes;

use commands::{CliConfig, ConfigCommand, ConnectArgs, DiscoverCommand, DriveCommand, PictureCommand};
use modes::oneshot::OneShotMode;
use modes::repl::run_repl;

/// RoboPi CLI - 轮式机器人命令行工具
#[derive(Parser, Debug)]
#[command(name = "robopi-cli")]
#[command(about = "Command-line interface for RoboPi robot control", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 配置管理
    #[command(subcommand)]
    Config(ConfigCommand),

    /// 连通性检查
    Ping {
        #[command(flatten)]
        args: ConnectArgs,
    },

    /// 依次执行运动命令
    Drive {
        #[command(flatten)]
        args: DriveCommand,
    },

    /// 拍照并保存
    Picture {
        #[command(flatten)]
        args: PictureCommand,
    },

    /// 搜索局域网内的设备
    Discover {
        #[command(flatten)]
        args: DiscoverCommand,
    },

    /// 启动交互式 Shell（REPL 模式）
    Shell {
        #[command(flatten)]
        args: ConnectArgs,
    },
}

fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("robopi_cli=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config(cmd) => cmd.execute(),

        Commands::Ping { args } => OneShotMode::new()?.ping(&args),

        Commands::Drive { args } => OneShotMode::new()?.drive(&args),

        Commands::Picture { args } => OneShotMode::new()?.picture(&args),

        Commands::Discover { args } => args.execute(&CliConfig::load()?),

        Commands::Shell { args } => run_repl(args),
    }
}
