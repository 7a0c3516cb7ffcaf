//! # RoboPi Net
//!
//! 传输层：TCP / TLS 1.3 字节流，以及控制通道使用的按行收发。
//!
//! ## 模块
//!
//! - `transport`: 明文 TCP 与 TLS 流的统一抽象 [`Transport`]
//! - `line`: 带缓冲的按行读写 [`LineStream`]
//! - `tls`: TLS 1.3 客户端 / 服务端配置（PEM 信任锚、证书、私钥）
//!
//! 本层不做任何重试，所有错误立即返回给上层。

use thiserror::Error;

pub mod line;
pub mod tls;
pub mod transport;

pub use line::LineStream;
pub use tls::{TlsClientSettings, TlsServerSettings, fingerprint};
pub use transport::{Transport, dial, is_timeout};

/// 传输层统一错误类型
#[derive(Error, Debug)]
pub enum NetError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS Error: {0}")]
    Tls(#[from] rustls::Error),

    #[error("Certificate Error: {0}")]
    Certificate(String),

    #[error("Invalid server name: {0:?}")]
    InvalidServerName(String),

    #[error("Protocol Error: {0}")]
    Protocol(#[from] robopi_protocol::ProtocolError),

    /// 对端在一行完整到达之前关闭了连接
    #[error("Connection closed by peer")]
    Closed,
}

impl NetError {
    /// 是否由读超时引起
    pub fn is_timeout(&self) -> bool {
        matches!(self, NetError::Io(e) if is_timeout(e))
    }
}
