//! 拍照命令

use clap::Args;
use std::path::PathBuf;

use super::connect::ConnectArgs;

#[derive(Args, Debug)]
pub struct PictureCommand {
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// 输出路径（默认 `picture.<jpg|png>`，扩展名按帧格式决定）
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}
