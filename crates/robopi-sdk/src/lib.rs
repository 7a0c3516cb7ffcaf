//! RoboPi SDK - 轮式机器人远程控制 Rust SDK
//!
//! 控制器通过一条持久的 TCP（可选 TLS 1.3）连接与机器人交换短文本命令，
//! 并通过第二条连接获取静态图片。
//!
//! # 架构设计
//!
//! 本 SDK 采用分层架构，从底层到高层：
//!
//! - **协议层** (`protocol`): 命令表、令牌常量、图片帧边界
//! - **传输层** (`net`): TCP / TLS 流与按行收发
//! - **客户端层** (`client`): 连接、命令通道、心跳、图片传输
//! - **设备层** (`device`): 设备侧会话分发与图片服务
//!
//! # 快速开始
//!
//! ```no_run
//! use robopi_sdk::prelude::*;
//!
//! let mut robot = ControllerBuilder::new().build();
//! robot.connect("192.168.1.42")?;
//! robot.forward()?;
//! robot.stop()?;
//! let picture = robot.take_picture()?;
//! picture.save(picture.file_name())?;
//! robot.disconnect()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub use robopi_client as client;
pub use robopi_device as device;
pub use robopi_net as net;
pub use robopi_protocol as protocol;

pub mod prelude;

// 客户端层（推荐入口）
pub use client::{
    CommError, CommErrorKind, ConnectionEvent, ConnectionState, ControllerBuilder, Picture,
    PictureConfig, RobotController,
};

// 设备层
pub use device::{Device, DeviceConfig, DeviceError, DeviceHandle, FidelityMode, PictureSource};

// 传输层
pub use net::{NetError, TlsClientSettings, TlsServerSettings};

// 协议层
pub use protocol::{Command, FrameFormat, ProtocolError};

use tracing_subscriber::EnvFilter;

/// 默认日志过滤规则（`RUST_LOG` 未设置时使用）
pub const DEFAULT_LOG_FILTER: &str =
    "robopi_client=info,robopi_device=info,robopi_net=info,robopi_protocol=info";

/// 初始化日志输出
///
/// 优先使用 `RUST_LOG` 环境变量；重复调用是无害的（只有第一次生效）。
pub fn init_logger() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logger_twice() {
        init_logger();
        init_logger();
    }

    #[test]
    fn test_default_filter_parses() {
        assert!(EnvFilter::try_new(DEFAULT_LOG_FILTER).is_ok());
    }
}
