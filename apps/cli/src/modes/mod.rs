//! 运行模式
//!
//! - `oneshot`: 连接 -> 执行 -> 断开
//! - `repl`: 交互式 Shell，保持连接

pub mod oneshot;
pub mod repl;
