//! 控制连接与问候握手

use crate::error::CommError;
use robopi_net::{LineStream, NetError, TlsClientSettings, Transport, dial};
use robopi_protocol::{CONN_ERR, CONTROL_PORT, Command, PICTURE_PORT};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;
use tracing::{debug, info, warn};

/// 连接状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

/// 建立连接时使用的参数（控制通道和图片通道共用）
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// 控制通道端口
    pub control_port: u16,
    /// 图片通道端口
    pub picture_port: u16,
    /// TCP 连接超时（`None` 使用系统默认值）
    pub connect_timeout: Option<Duration>,
    /// TLS 设置（`None` 表示明文 TCP）
    pub tls: Option<TlsClientSettings>,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            control_port: CONTROL_PORT,
            picture_port: PICTURE_PORT,
            connect_timeout: Some(Duration::from_secs(5)),
            tls: None,
        }
    }
}

/// 打开一条按行收发的流（按需完成 TLS 握手）
pub(crate) fn open_stream(
    host: &str,
    port: u16,
    options: &ConnectOptions,
) -> Result<LineStream, NetError> {
    let tcp = dial(host, port, options.connect_timeout)?;
    let transport = match &options.tls {
        Some(tls) => tls.connect(host, tcp)?,
        None => Transport::Plain(tcp),
    };
    LineStream::new(transport)
}

/// 到设备的控制连接
///
/// 只在问候握手收到 `CONN_OK` 之后才会被创建出来；其他结果都不会留下连接。
#[derive(Debug)]
pub struct Connection {
    stream: LineStream,
    host: String,
    state: ConnectionState,
}

impl Connection {
    /// 连接设备并完成问候握手
    ///
    /// - `CONN_ERR`：[`CommError::CantConnect`]
    /// - 其他非 `CONN_OK` 应答：[`CommError::IncorrectDevice`]
    /// - 任何 I/O 或 TLS 失败：[`CommError::CantConnect`]
    ///
    /// 本函数不做重试。
    pub fn open(host: &str, options: &ConnectOptions) -> Result<Self, CommError> {
        let mut stream = open_stream(host, options.control_port, options).map_err(|e| {
            CommError::cant_connect(
                format!("cannot reach {}:{}", host, options.control_port),
                e,
            )
        })?;
        let peer = stream.peer();
        debug!("Connected to {} (tls: {})", peer, stream.is_tls());

        let connect = Command::Connect;
        let reply = match stream
            .write_line(connect.verb())
            .and_then(|_| stream.read_line())
        {
            Ok(reply) => reply,
            Err(e) => {
                stream.close();
                return Err(CommError::cant_connect(
                    format!("greeting with {peer} failed"),
                    e,
                ));
            },
        };

        if reply == connect.confirmation() {
            info!("Session established with {} ({})", host, peer);
            return Ok(Self {
                stream,
                host: host.to_string(),
                state: ConnectionState::Connected,
            });
        }

        stream.close();
        if reply == CONN_ERR {
            warn!("Device {} refused the connection", peer);
            Err(CommError::CantConnect {
                reason: format!("device at {peer} refused the connection ({CONN_ERR})"),
                source: None,
            })
        } else {
            warn!("Unexpected greeting reply from {}: {:?}", peer, reply);
            Err(CommError::IncorrectDevice {
                peer: peer.to_string(),
                reply,
            })
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn peer(&self) -> SocketAddr {
        self.stream.peer()
    }

    /// 一次请求/应答交换（调用方必须持有交换锁）
    pub(crate) fn exchange(&mut self, line: &str) -> Result<String, NetError> {
        self.stream.write_line(line)?;
        self.stream.read_line()
    }

    pub(crate) fn set_state(&mut self, state: ConnectionState) {
        self.state = state;
    }

    /// 释放 socket 资源（不修改状态）
    pub(crate) fn close(&mut self) {
        self.stream.close();
    }

    pub(crate) fn shutdown_handle(&self) -> std::io::Result<TcpStream> {
        self.stream.shutdown_handle()
    }
}
