//! Builder 模式实现
//!
//! 提供链式构造 [`RobotController`] 的便捷方式。

use crate::connection::ConnectOptions;
use crate::controller::RobotController;
use crate::picture::PictureConfig;
use robopi_net::TlsClientSettings;
use robopi_protocol::DEFAULT_KEEPALIVE_INTERVAL;
use std::time::Duration;

/// RobotController Builder（链式构造）
///
/// # Example
///
/// ```no_run
/// use robopi_client::ControllerBuilder;
/// use std::time::Duration;
///
/// let mut robot = ControllerBuilder::new()
///     .keepalive_interval(Duration::from_secs(5))
///     .build();
/// robot.connect("192.168.1.42").unwrap();
/// robot.forward().unwrap();
/// robot.stop().unwrap();
/// robot.disconnect().unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct ControllerBuilder {
    options: ConnectOptions,
    keepalive_interval: Duration,
    picture: PictureConfig,
}

impl Default for ControllerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ControllerBuilder {
    pub fn new() -> Self {
        Self {
            options: ConnectOptions::default(),
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
            picture: PictureConfig::default(),
        }
    }

    /// 控制通道端口（默认 2025）
    pub fn control_port(mut self, port: u16) -> Self {
        self.options.control_port = port;
        self
    }

    /// 图片通道端口（默认 2026）
    pub fn picture_port(mut self, port: u16) -> Self {
        self.options.picture_port = port;
        self
    }

    /// TCP 连接超时（`None` 使用系统默认值）
    pub fn connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.options.connect_timeout = timeout;
        self
    }

    /// 启用 TLS
    pub fn tls(mut self, tls: TlsClientSettings) -> Self {
        self.options.tls = Some(tls);
        self
    }

    /// 心跳间隔（默认 10 秒）
    pub fn keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }

    /// 图片传输参数
    pub fn picture_config(mut self, config: PictureConfig) -> Self {
        self.picture = config;
        self
    }

    pub fn options(&self) -> &ConnectOptions {
        &self.options
    }

    /// 构造控制器（启动心跳线程，此时尚未连接）
    pub fn build(self) -> RobotController {
        RobotController::new(self.options, self.keepalive_interval, self.picture)
    }
}
