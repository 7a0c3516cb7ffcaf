//! # RoboPi Protocol
//!
//! RoboPi 控制协议定义（无网络依赖）
//!
//! ## 模块
//!
//! - `command`: 命令动词与确认令牌表
//! - `constants`: 端口、令牌等协议常量
//! - `picture`: 图片通道的帧边界识别
//!
//! ## 线路格式
//!
//! 控制通道上每个请求、每个应答都是一行 ASCII 文本，以 `\n` 结尾。
//! 图片通道在 `PICTURE_OK` 之后切换为不带分隔的原始字节流。

pub mod command;
pub mod constants;
pub mod picture;

// 重新导出常用类型
pub use command::Command;
pub use constants::*;
pub use picture::{FrameFormat, frame_len, trim_padding};

use thiserror::Error;

/// 协议层错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// 命令表中不存在的动词
    #[error("Unknown verb: {0:?}")]
    UnknownVerb(String),

    /// 行长度超过协议上限
    #[error("Line too long: {len} bytes (max {max})")]
    LineTooLong { len: usize, max: usize },
}

/// 去掉一行末尾的 `\n` 或 `\r\n`
///
/// 读端同时接受两种换行约定，写端统一只写 `\n`。
///
/// ```rust
/// use robopi_protocol::trim_line_ending;
///
/// assert_eq!(trim_line_ending("PING\r\n"), "PING");
/// assert_eq!(trim_line_ending("PING\n"), "PING");
/// assert_eq!(trim_line_ending("PING"), "PING");
/// ```
pub fn trim_line_ending(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}
