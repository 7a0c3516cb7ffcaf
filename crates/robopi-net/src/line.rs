//! 按行收发
//!
//! 控制通道与图片通道的文本部分都是 `\n` 结尾的 ASCII 行。
//! [`LineStream`] 在 [`Transport`] 外包一层 `BufReader`：
//! 图片通道在 `PICTURE_OK` 之后切换到原始字节，必须继续从同一个缓冲区读，
//! 否则已经被缓冲的图片字节会丢失。

use crate::transport::Transport;
use crate::NetError;
use robopi_protocol::{MAX_LINE_LEN, ProtocolError, trim_line_ending};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;
use tracing::trace;

/// 带缓冲的按行读写流
#[derive(Debug)]
pub struct LineStream {
    reader: BufReader<Transport>,
    peer: SocketAddr,
}

impl LineStream {
    pub fn new(transport: Transport) -> Result<Self, NetError> {
        let peer = transport.peer_addr()?;
        Ok(Self {
            reader: BufReader::new(transport),
            peer,
        })
    }

    /// 对端地址
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn is_tls(&self) -> bool {
        self.reader.get_ref().is_tls()
    }

    /// 写一行并立即刷新
    ///
    /// 行内容不含换行符，换行由本函数补上。
    pub fn write_line(&mut self, line: &str) -> Result<(), NetError> {
        trace!("{} <- {}", self.peer, line);
        let transport = self.reader.get_mut();
        let mut framed = String::with_capacity(line.len() + 1);
        framed.push_str(line);
        framed.push('\n');
        transport.write_all(framed.as_bytes())?;
        transport.flush()?;
        Ok(())
    }

    /// 读一行（去掉 `\n` / `\r\n`）
    ///
    /// - 连接在任何字节到达之前关闭：[`NetError::Closed`]
    /// - 最后一行没有换行符但连接已关闭：按完整行返回
    /// - 超过 [`MAX_LINE_LEN`] 仍未见换行：[`ProtocolError::LineTooLong`]
    pub fn read_line(&mut self) -> Result<String, NetError> {
        // 换行最多占 2 字节
        let limit = (MAX_LINE_LEN + 2) as u64;
        let mut buf = String::new();
        let n = (&mut self.reader).take(limit).read_line(&mut buf)?;

        if n == 0 {
            return Err(NetError::Closed);
        }
        if !buf.ends_with('\n') && n as u64 == limit {
            return Err(ProtocolError::LineTooLong {
                len: n,
                max: MAX_LINE_LEN,
            }
            .into());
        }

        let line = trim_line_ending(&buf);
        if line.len() > MAX_LINE_LEN {
            return Err(ProtocolError::LineTooLong {
                len: line.len(),
                max: MAX_LINE_LEN,
            }
            .into());
        }

        trace!("{} -> {}", self.peer, line);
        Ok(line.to_string())
    }

    /// 读原始字节（先消费缓冲区中剩余的数据）
    pub fn read_raw(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }

    /// 写原始字节并刷新
    pub fn write_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        let transport = self.reader.get_mut();
        transport.write_all(bytes)?;
        transport.flush()
    }

    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.reader.get_ref().set_read_timeout(timeout)
    }

    /// 克隆底层 socket 句柄
    ///
    /// 另一个线程可以用它 `shutdown`，从而打断阻塞中的读。
    pub fn shutdown_handle(&self) -> io::Result<TcpStream> {
        self.reader.get_ref().tcp().try_clone()
    }

    /// 关闭连接
    pub fn close(&mut self) {
        trace!("Closing stream to {}", self.peer);
        self.reader.get_mut().close();
    }
}
