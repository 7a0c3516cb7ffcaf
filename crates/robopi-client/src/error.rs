//! 控制器侧错误类型定义

use robopi_net::NetError;
use thiserror::Error;

/// 通信错误
///
/// 五种失败类别对应前端需要区分的五种处理方式（重试连接、换设备、提示重连、
/// 报告机器人故障、放弃本次拍照）。
#[derive(Error, Debug)]
pub enum CommError {
    /// 无法建立或使用连接（socket / TLS / I/O 失败，设备拒绝连接，或尚未连接）
    #[error("Can't connect: {reason}")]
    CantConnect {
        reason: String,
        #[source]
        source: Option<NetError>,
    },

    /// 对端不是 RoboPi 设备（问候应答既不是 `CONN_OK` 也不是 `CONN_ERR`）
    #[error("Incorrect device at {peer}: unexpected greeting reply {reply:?}")]
    IncorrectDevice { peer: String, reply: String },

    /// 心跳失败，连接已被关闭
    #[error("Lost connection: {0}")]
    LostConnection(String),

    /// 设备应答了错误的确认令牌
    #[error("Robot error: {command} answered with {reply:?}")]
    Robot { command: String, reply: String },

    /// 图片传输失败
    #[error("Picture transfer error: {0}")]
    PictureTransfer(String),
}

/// 错误类别（不带负载，便于匹配和统计）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommErrorKind {
    CantConnect,
    IncorrectDevice,
    LostConnection,
    RobotError,
    PictureTransferError,
}

impl CommError {
    pub fn kind(&self) -> CommErrorKind {
        match self {
            CommError::CantConnect { .. } => CommErrorKind::CantConnect,
            CommError::IncorrectDevice { .. } => CommErrorKind::IncorrectDevice,
            CommError::LostConnection(_) => CommErrorKind::LostConnection,
            CommError::Robot { .. } => CommErrorKind::RobotError,
            CommError::PictureTransfer(_) => CommErrorKind::PictureTransferError,
        }
    }

    pub(crate) fn cant_connect(reason: impl Into<String>, source: NetError) -> Self {
        CommError::CantConnect {
            reason: reason.into(),
            source: Some(source),
        }
    }

    pub(crate) fn not_connected() -> Self {
        CommError::CantConnect {
            reason: "not connected".to_string(),
            source: None,
        }
    }
}
