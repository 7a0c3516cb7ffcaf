//! 控制通道应答规则
//!
//! 纯函数：给定一行请求和忠实度，决定应答令牌以及会话接下来的走向。
//! 网络部分见 `dispatcher`。

use crate::config::FidelityMode;
use robopi_protocol::{CMD_ERR, Command};

/// 应答之后会话的走向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// 继续读下一行
    Continue,
    /// 关闭本次会话
    CloseSession,
    /// 关闭会话并停止整个设备（仅测试夹具）
    StopDevice,
}

/// 一行请求的处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub reply: String,
    pub directive: Directive,
}

impl Response {
    fn new(reply: impl Into<String>, directive: Directive) -> Self {
        Self {
            reply: reply.into(),
            directive,
        }
    }
}

/// 会话建立后对一行请求的应答
///
/// - 未识别的动词：`CMD_ERR`，会话继续
/// - `DISCONN`：两种模式都回复 `DISCONN_OK` 并关闭会话
/// - 其他动词：faithful 回复确认令牌，faulty 回复 `<VERB>_KO`
pub fn respond(line: &str, mode: FidelityMode, harness_exit: bool) -> Response {
    let Some(cmd) = Command::from_verb(line) else {
        return Response::new(CMD_ERR, Directive::Continue);
    };

    if cmd == Command::Disconnect {
        let directive = if harness_exit && mode == FidelityMode::Faulty {
            Directive::StopDevice
        } else {
            Directive::CloseSession
        };
        return Response::new(cmd.confirmation(), directive);
    }

    match mode {
        FidelityMode::Faithful => {
            let directive = if harness_exit && cmd == Command::Stop {
                Directive::StopDevice
            } else {
                Directive::Continue
            };
            Response::new(cmd.confirmation(), directive)
        },
        FidelityMode::Faulty => Response::new(cmd.faulty_reply(), Directive::Continue),
    }
}
