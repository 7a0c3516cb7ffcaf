//! 命令定义和实现

pub mod config;
pub mod connect;
pub mod discover;
pub mod drive;
pub mod picture;

pub use config::{CliConfig, ConfigCommand};
pub use connect::ConnectArgs;
pub use discover::DiscoverCommand;
pub use drive::DriveCommand;
pub use picture::PictureCommand;
