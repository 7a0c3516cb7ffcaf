//! 命令通道
//!
//! 每条控制连接上同一时刻只有一个请求/应答交换。前台命令、心跳线程和状态查询
//! 共享同一把交换锁，[`MotionState`](CommandChannel::is_moving) 也只在锁内修改。

use crate::connection::{ConnectOptions, Connection, ConnectionState};
use crate::error::CommError;
use parking_lot::Mutex;
use robopi_protocol::{Command, DISCONNECT_MAX_ATTEMPTS};
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

#[derive(Debug, Default)]
struct ChannelInner {
    conn: Option<Connection>,
    moving: bool,
}

impl ChannelInner {
    fn connected(&mut self) -> Result<&mut Connection, CommError> {
        match self.conn.as_mut() {
            Some(conn) if conn.state() == ConnectionState::Connected => Ok(conn),
            _ => Err(CommError::not_connected()),
        }
    }
}

/// 命令通道（`Clone` 共享同一连接和同一把交换锁）
#[derive(Debug, Clone, Default)]
pub struct CommandChannel {
    inner: Arc<Mutex<ChannelInner>>,
    /// 底层 socket 的克隆句柄，不受交换锁保护，用于打断阻塞中的读
    abort_handle: Arc<Mutex<Option<TcpStream>>>,
}

impl CommandChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// 连接设备，替换当前连接
    pub fn connect(&self, host: &str, options: &ConnectOptions) -> Result<(), CommError> {
        let conn = Connection::open(host, options)?;
        self.attach(conn);
        Ok(())
    }

    /// 挂上一条已握手的连接；旧连接（如果有）会被关闭
    pub fn attach(&self, conn: Connection) {
        let handle = conn.shutdown_handle().ok();
        let mut inner = self.inner.lock();
        if let Some(mut old) = inner.conn.replace(conn) {
            debug!("Replacing connection to {}", old.host());
            old.close();
        }
        *self.abort_handle.lock() = handle;
    }

    /// 发送一个命令并校验确认令牌
    ///
    /// 成功的运动命令置位运动状态，成功的 `STOP` 清除它。
    pub fn execute(&self, cmd: Command) -> Result<(), CommError> {
        let mut inner = self.inner.lock();
        let conn = inner.connected()?;

        let reply = conn
            .exchange(cmd.verb())
            .map_err(|e| CommError::cant_connect(format!("{cmd} exchange failed"), e))?;

        if reply != cmd.confirmation() {
            warn!("{} answered with {:?}", cmd, reply);
            return Err(CommError::Robot {
                command: cmd.verb().to_string(),
                reply,
            });
        }

        trace!("{} confirmed", cmd);
        if cmd.is_motion() {
            inner.moving = true;
        } else if cmd == Command::Stop {
            inner.moving = false;
        }
        Ok(())
    }

    /// 断开会话
    ///
    /// 最多发送 [`DISCONNECT_MAX_ATTEMPTS`] 次 `DISCONN`，之后无论结果如何都关闭 socket。
    /// 只有最后一次尝试收到 `DISCONN_OK` 时状态才变为 `Disconnected`；
    /// 用尽次数时保留原状态并返回 [`CommError::Robot`]。
    pub fn disconnect(&self) -> Result<(), CommError> {
        let mut inner = self.inner.lock();
        let conn = inner.connected()?;
        let cmd = Command::Disconnect;

        let mut outcome = Err(CommError::Robot {
            command: cmd.verb().to_string(),
            reply: String::new(),
        });
        for attempt in 1..=DISCONNECT_MAX_ATTEMPTS {
            match conn.exchange(cmd.verb()) {
                Ok(reply) if reply == cmd.confirmation() => {
                    outcome = Ok(());
                    break;
                },
                Ok(reply) => {
                    debug!(
                        "Disconnect attempt {}/{} answered with {:?}",
                        attempt, DISCONNECT_MAX_ATTEMPTS, reply
                    );
                    outcome = Err(CommError::Robot {
                        command: cmd.verb().to_string(),
                        reply,
                    });
                },
                Err(e) => {
                    outcome = Err(CommError::cant_connect("disconnect exchange failed", e));
                    break;
                },
            }
        }

        conn.close();
        *self.abort_handle.lock() = None;

        match outcome {
            Ok(()) => {
                conn.set_state(ConnectionState::Disconnected);
                info!("Disconnected from {}", conn.host());
                Ok(())
            },
            Err(e) => {
                warn!("Disconnect from {} failed: {}", conn.host(), e);
                Err(e)
            },
        }
    }

    /// 心跳
    ///
    /// 应答不是回显或 I/O 失败时关闭连接、状态置为 `Disconnected`，返回
    /// [`CommError::LostConnection`]。
    pub fn ping(&self) -> Result<(), CommError> {
        let mut inner = self.inner.lock();
        let conn = inner.connected()?;
        let cmd = Command::Ping;

        let reason = match conn.exchange(cmd.verb()) {
            Ok(reply) if reply == cmd.confirmation() => {
                trace!("Ping to {} ok", conn.host());
                return Ok(());
            },
            Ok(reply) => format!("unexpected ping reply {reply:?}"),
            Err(e) => format!("ping failed: {e}"),
        };

        warn!("Connection to {} lost: {}", conn.host(), reason);
        conn.close();
        conn.set_state(ConnectionState::Disconnected);
        *self.abort_handle.lock() = None;
        Err(CommError::LostConnection(reason))
    }

    /// 正在运动时才发送 `STOP`，返回是否真的发送了
    pub fn stop_if_moving(&self) -> Result<bool, CommError> {
        if !self.is_moving() {
            return Ok(false);
        }
        self.execute(Command::Stop).map(|_| true)
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn state(&self) -> ConnectionState {
        self.inner
            .lock()
            .conn
            .as_ref()
            .map_or(ConnectionState::Disconnected, |c| c.state())
    }

    pub fn is_moving(&self) -> bool {
        self.inner.lock().moving
    }

    /// 当前（或最近一次）连接的主机
    pub fn remote_host(&self) -> Option<String> {
        self.inner.lock().conn.as_ref().map(|c| c.host().to_string())
    }

    /// 不经过交换锁直接关闭 socket
    ///
    /// 阻塞在读上的交换会因此以 I/O 错误返回。
    pub fn abort(&self) {
        if let Some(sock) = self.abort_handle.lock().take() {
            let _ = sock.shutdown(Shutdown::Both);
        }
    }

    /// 释放连接资源（不发送 `DISCONN`）
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        if let Some(conn) = inner.conn.as_mut() {
            conn.close();
            conn.set_state(ConnectionState::Disconnected);
        }
        *self.abort_handle.lock() = None;
    }
}
