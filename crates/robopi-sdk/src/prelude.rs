//! Prelude - 常用类型的便捷导入
//!
//! ```rust
//! use robopi_sdk::prelude::*;
//! ```

// 控制器侧
pub use crate::client::{
    CommError, CommErrorKind, ConnectionEvent, ConnectionState, ControllerBuilder, Discovery,
    Picture, PictureConfig, RobotController, StaticDiscovery,
};

// 设备侧
pub use crate::device::{Device, DeviceConfig, DeviceHandle, FidelityMode, PictureSource};

// TLS
pub use crate::net::{TlsClientSettings, TlsServerSettings};

// 协议
pub use crate::protocol::{Command, FrameFormat};
