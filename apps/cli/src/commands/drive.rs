//! 运动命令序列

use anyhow::{Context, Result};
use clap::Args;
use robopi_sdk::Command;
use std::time::Duration;

use super::connect::ConnectArgs;

/// 依次执行的命令，例如 `drive FWD ROTATE_LEFT STOP`
#[derive(Args, Debug)]
pub struct DriveCommand {
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// 命令动词（FWD, BKWD, ROTATE_LEFT, ..., STOP, PING）
    #[arg(required = true)]
    pub verbs: Vec<String>,

    /// 相邻命令之间的间隔（毫秒）
    #[arg(long, default_value_t = 500)]
    pub hold_ms: u64,
}

impl DriveCommand {
    /// 解析命令序列；连接和断开由 `connect` / `disconnect` 自身负责，不能出现在序列里
    pub fn parse_commands(&self) -> Result<Vec<Command>> {
        self.verbs
            .iter()
            .map(|verb| {
                let cmd: Command = verb
                    .to_ascii_uppercase()
                    .parse()
                    .with_context(|| format!("未知命令: {verb}"))?;
                anyhow::ensure!(
                    !matches!(cmd, Command::Connect | Command::Disconnect),
                    "{verb} 不能出现在命令序列中"
                );
                Ok(cmd)
            })
            .collect()
    }

    pub fn hold(&self) -> Duration {
        Duration::from_millis(self.hold_ms)
    }
}
