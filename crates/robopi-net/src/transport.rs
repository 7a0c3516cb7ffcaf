//! 字节流传输
//!
//! [`Transport`] 把明文 TCP 和两种方向的 TLS 流统一成一个 `Read + Write` 类型，
//! 上层（按行协议、图片字节流）不需要关心是否加密。

use crate::NetError;
use rustls::{ClientConnection, ServerConnection, StreamOwned};
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::{debug, trace};

/// 已建立的字节流
pub enum Transport {
    /// 明文 TCP
    Plain(TcpStream),
    /// 控制器侧 TLS
    TlsClient(Box<StreamOwned<ClientConnection, TcpStream>>),
    /// 设备侧 TLS
    TlsServer(Box<StreamOwned<ServerConnection, TcpStream>>),
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            Transport::Plain(_) => "Plain",
            Transport::TlsClient(_) => "TlsClient",
            Transport::TlsServer(_) => "TlsServer",
        };
        f.debug_struct("Transport")
            .field("kind", &kind)
            .field("peer", &self.tcp().peer_addr().ok())
            .finish()
    }
}

impl Transport {
    /// 底层 TCP socket
    pub fn tcp(&self) -> &TcpStream {
        match self {
            Transport::Plain(s) => s,
            Transport::TlsClient(s) => &s.sock,
            Transport::TlsServer(s) => &s.sock,
        }
    }

    /// 是否为 TLS 流
    pub fn is_tls(&self) -> bool {
        !matches!(self, Transport::Plain(_))
    }

    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.tcp().peer_addr()
    }

    /// 设置读超时（`None` 表示无限等待）
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.tcp().set_read_timeout(timeout)
    }

    /// 关闭连接
    ///
    /// TLS 流先尽力发送 `close_notify`，然后无条件关闭 socket 两个方向。
    /// 所有错误只记录不返回：调用方此时已经放弃这条连接。
    pub fn close(&mut self) {
        match self {
            Transport::Plain(_) => {},
            Transport::TlsClient(s) => {
                s.conn.send_close_notify();
                let _ = s.conn.complete_io(&mut s.sock);
            },
            Transport::TlsServer(s) => {
                s.conn.send_close_notify();
                let _ = s.conn.complete_io(&mut s.sock);
            },
        }

        if let Err(e) = self.tcp().shutdown(Shutdown::Both)
            && e.kind() != io::ErrorKind::NotConnected
        {
            debug!("Socket shutdown failed: {}", e);
        }
    }
}

impl Read for Transport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Transport::Plain(s) => s.read(buf),
            Transport::TlsClient(s) => s.read(buf),
            Transport::TlsServer(s) => s.read(buf),
        }
    }
}

impl Write for Transport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Transport::Plain(s) => s.write(buf),
            Transport::TlsClient(s) => s.write(buf),
            Transport::TlsServer(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Transport::Plain(s) => s.flush(),
            Transport::TlsClient(s) => s.flush(),
            Transport::TlsServer(s) => s.flush(),
        }
    }
}

/// 建立 TCP 连接
///
/// 依次尝试 `host:port` 解析出的每个地址，返回第一个成功的连接。
/// `timeout` 为 `None` 时使用系统默认的连接超时。
pub fn dial(host: &str, port: u16, timeout: Option<Duration>) -> Result<TcpStream, NetError> {
    let mut last_err = None;

    for addr in (host, port).to_socket_addrs()? {
        trace!("Dialing {}", addr);
        let result = match timeout {
            Some(t) => TcpStream::connect_timeout(&addr, t),
            None => TcpStream::connect(addr),
        };
        match result {
            Ok(stream) => {
                stream.set_nodelay(true)?;
                return Ok(stream);
            },
            Err(e) => last_err = Some(e),
        }
    }

    Err(NetError::Io(last_err.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("no address found for {host}:{port}"),
        )
    })))
}

/// 读超时在不同平台上表现为 `WouldBlock` 或 `TimedOut`
pub fn is_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}
