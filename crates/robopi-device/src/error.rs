//! 设备侧错误类型定义

use robopi_net::NetError;
use thiserror::Error;

/// 设备侧错误类型
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    /// 传输层错误（TLS 握手、行格式等）
    #[error("Transport error: {0}")]
    Net(#[from] NetError),

    /// 监听端口绑定失败
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// 图片源无法加载或生成
    #[error("Picture source error: {0}")]
    Picture(String),

    /// 工作线程创建失败或 panic
    #[error("Thread error: {0}")]
    Thread(String),
}
