//! 控制器门面
//!
//! [`RobotController`] 组合命令通道、心跳监视器和图片传输，对外提供按动作命名的方法。

use crate::channel::CommandChannel;
use crate::connection::{ConnectOptions, Connection, ConnectionState};
use crate::error::CommError;
use crate::keepalive::{ConnectionEvent, KeepaliveMonitor};
use crate::picture::{Picture, PictureConfig, PictureTransfer};
use crossbeam_channel::Receiver;
use robopi_protocol::Command;
use std::time::Duration;
use tracing::info;

/// 机器人控制器
///
/// 通过 [`ControllerBuilder`](crate::ControllerBuilder) 构造。
/// 丢弃时停止心跳线程并关闭连接（不发送 `DISCONN`）。
#[derive(Debug)]
pub struct RobotController {
    channel: CommandChannel,
    monitor: KeepaliveMonitor,
    pictures: PictureTransfer,
    options: ConnectOptions,
}

impl RobotController {
    pub(crate) fn new(options: ConnectOptions, keepalive: Duration, picture: PictureConfig) -> Self {
        let channel = CommandChannel::new();
        let monitor = KeepaliveMonitor::spawn(channel.clone(), keepalive);
        let pictures = PictureTransfer::new(options.clone(), picture);
        Self {
            channel,
            monitor,
            pictures,
            options,
        }
    }

    /// 连接设备并开始心跳
    ///
    /// 已有的连接会被直接关闭并替换。
    pub fn connect(&mut self, host: &str) -> Result<(), CommError> {
        self.monitor.deactivate();
        let conn = Connection::open(host, &self.options)?;
        self.channel.attach(conn);
        self.monitor.activate();
        info!("Controller connected to {}", host);
        Ok(())
    }

    /// 停止心跳并断开会话
    pub fn disconnect(&mut self) -> Result<(), CommError> {
        self.monitor.deactivate();
        self.channel.disconnect()
    }

    pub fn forward(&self) -> Result<(), CommError> {
        self.channel.execute(Command::Forward)
    }

    pub fn backward(&self) -> Result<(), CommError> {
        self.channel.execute(Command::Backward)
    }

    pub fn rotate_left(&self) -> Result<(), CommError> {
        self.channel.execute(Command::RotateLeft)
    }

    pub fn rotate_right(&self) -> Result<(), CommError> {
        self.channel.execute(Command::RotateRight)
    }

    pub fn front_left(&self) -> Result<(), CommError> {
        self.channel.execute(Command::FrontLeft)
    }

    pub fn front_right(&self) -> Result<(), CommError> {
        self.channel.execute(Command::FrontRight)
    }

    pub fn back_left(&self) -> Result<(), CommError> {
        self.channel.execute(Command::BackLeft)
    }

    pub fn back_right(&self) -> Result<(), CommError> {
        self.channel.execute(Command::BackRight)
    }

    pub fn stop(&self) -> Result<(), CommError> {
        self.channel.execute(Command::Stop)
    }

    /// 正在运动时才发送 `STOP`（按键松开时使用）
    pub fn stop_if_moving(&self) -> Result<bool, CommError> {
        self.channel.stop_if_moving()
    }

    /// 发送任意命令表中的命令
    ///
    /// `CONN` 和 `DISCONN` 有专门的握手流程，请使用 [`connect`](Self::connect) /
    /// [`disconnect`](Self::disconnect)。
    pub fn execute(&self, cmd: Command) -> Result<(), CommError> {
        self.channel.execute(cmd)
    }

    /// 手动心跳
    pub fn ping(&self) -> Result<(), CommError> {
        self.channel.ping()
    }

    /// 拍照
    pub fn take_picture(&self) -> Result<Picture, CommError> {
        let host = self
            .channel
            .remote_host()
            .ok_or_else(CommError::not_connected)?;
        self.pictures.fetch(&host, self.channel.is_connected())
    }

    pub fn is_connected(&self) -> bool {
        self.channel.is_connected()
    }

    pub fn state(&self) -> ConnectionState {
        self.channel.state()
    }

    pub fn is_moving(&self) -> bool {
        self.channel.is_moving()
    }

    pub fn remote_host(&self) -> Option<String> {
        self.channel.remote_host()
    }

    /// 连接事件（心跳失败时收到 [`ConnectionEvent::Lost`]）
    pub fn events(&self) -> Receiver<ConnectionEvent> {
        self.monitor.events()
    }

    /// 共享的命令通道（状态轮询等场景）
    pub fn channel(&self) -> &CommandChannel {
        &self.channel
    }
}

impl Drop for RobotController {
    fn drop(&mut self) {
        // 先打断可能阻塞在读上的心跳，再等待线程退出
        self.monitor.request_shutdown();
        self.channel.abort();
        self.monitor.shutdown();
        self.channel.close();
    }
}
