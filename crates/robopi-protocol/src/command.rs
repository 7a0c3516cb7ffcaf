//! 命令表
//!
//! 控制通道的全部 12 个命令动词及其确认令牌。命令表是进程级静态数据，
//! 加载后不会被修改。

use crate::ProtocolError;
use std::fmt;
use std::str::FromStr;

/// 控制通道命令
///
/// 每个命令是不可变的 `{动词, 期望确认令牌}` 对。
///
/// # 示例
///
/// ```rust
/// use robopi_protocol::Command;
///
/// let cmd: Command = "FWD".parse().unwrap();
/// assert_eq!(cmd, Command::Forward);
/// assert_eq!(cmd.confirmation(), "FWD_OK");
///
/// // PING 的确认令牌就是它自己
/// assert_eq!(Command::Ping.confirmation(), Command::Ping.verb());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Command {
    /// 问候（建立会话）
    Connect,
    /// 前进
    Forward,
    /// 后退
    Backward,
    /// 原地左转
    RotateLeft,
    /// 原地右转
    RotateRight,
    /// 左前
    FrontLeft,
    /// 右前
    FrontRight,
    /// 左后
    BackLeft,
    /// 右后
    BackRight,
    /// 停止
    Stop,
    /// 断开会话
    Disconnect,
    /// 心跳（回显）
    Ping,
}

impl Command {
    /// 完整命令表
    pub const ALL: [Command; 12] = [
        Command::Connect,
        Command::Forward,
        Command::Backward,
        Command::RotateLeft,
        Command::RotateRight,
        Command::FrontLeft,
        Command::FrontRight,
        Command::BackLeft,
        Command::BackRight,
        Command::Stop,
        Command::Disconnect,
        Command::Ping,
    ];

    /// 运动类命令（成功后机器人处于运动状态）
    pub const MOTIONS: [Command; 8] = [
        Command::Forward,
        Command::Backward,
        Command::RotateLeft,
        Command::RotateRight,
        Command::FrontLeft,
        Command::FrontRight,
        Command::BackLeft,
        Command::BackRight,
    ];

    /// 线路上的动词
    pub const fn verb(self) -> &'static str {
        match self {
            Command::Connect => "CONN",
            Command::Forward => "FWD",
            Command::Backward => "BKWD",
            Command::RotateLeft => "ROTATE_LEFT",
            Command::RotateRight => "ROTATE_RIGHT",
            Command::FrontLeft => "FRONT_L",
            Command::FrontRight => "FRONT_R",
            Command::BackLeft => "BCK_L",
            Command::BackRight => "BCK_R",
            Command::Stop => "STOP",
            Command::Disconnect => "DISCONN",
            Command::Ping => "PING",
        }
    }

    /// 成功时期望收到的确认令牌
    pub const fn confirmation(self) -> &'static str {
        match self {
            Command::Connect => "CONN_OK",
            Command::Forward => "FWD_OK",
            Command::Backward => "BKWD_OK",
            Command::RotateLeft => "ROTATE_LEFT_OK",
            Command::RotateRight => "ROTATE_RIGHT_OK",
            Command::FrontLeft => "FRONT_L_OK",
            Command::FrontRight => "FRONT_R_OK",
            Command::BackLeft => "BCK_L_OK",
            Command::BackRight => "BCK_R_OK",
            Command::Stop => "STOP_OK",
            Command::Disconnect => "DISCONN_OK",
            // 退化的回显
            Command::Ping => "PING",
        }
    }

    /// faulty 设备故意返回的错误令牌（`<VERB>_KO`）
    ///
    /// 保证与 [`confirmation`](Self::confirmation) 不同。
    pub fn faulty_reply(self) -> String {
        format!("{}_KO", self.verb())
    }

    /// 是否为运动类命令
    pub fn is_motion(self) -> bool {
        Self::MOTIONS.contains(&self)
    }

    /// 按动词查表（精确匹配，区分大小写）
    pub fn from_verb(verb: &str) -> Option<Command> {
        Self::ALL.into_iter().find(|cmd| cmd.verb() == verb)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.verb())
    }
}

impl FromStr for Command {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Command::from_verb(s).ok_or_else(|| ProtocolError::UnknownVerb(s.to_string()))
    }
}
