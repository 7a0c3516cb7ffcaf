//! # RoboPi Client
//!
//! 控制器侧协议实现。
//!
//! ## 模块
//!
//! - `connection`: 控制连接与问候握手
//! - `channel`: 命令通道（单一交换锁 + 运动状态）
//! - `keepalive`: 心跳监视线程
//! - `picture`: 图片传输（带重发协商）
//! - `discovery`: 设备发现接口
//! - `controller` / `builder`: 对外门面
//!
//! ## 并发模型
//!
//! 全部使用操作系统线程。同一控制连接上的前台命令、心跳和状态查询共享一把
//! `parking_lot::Mutex`；图片传输使用自己独立的锁。

pub mod builder;
pub mod channel;
pub mod connection;
pub mod controller;
pub mod discovery;
pub mod error;
pub mod keepalive;
pub mod picture;

pub use builder::ControllerBuilder;
pub use channel::CommandChannel;
pub use connection::{ConnectOptions, Connection, ConnectionState};
pub use controller::RobotController;
pub use discovery::{Discovery, StaticDiscovery};
pub use error::{CommError, CommErrorKind};
pub use keepalive::{ConnectionEvent, KeepaliveMonitor};
pub use picture::{Picture, PictureConfig, PictureSession, PictureTransfer};
