//! 协议常量定义
//!
//! 端口、非命令表令牌以及各类协议上限。

use std::time::Duration;

// ============================================================================
// 端口
// ============================================================================

/// 控制通道端口
pub const CONTROL_PORT: u16 = 2025;

/// 图片通道端口（独立监听，不与控制通道复用）
pub const PICTURE_PORT: u16 = 2026;

// ============================================================================
// 控制通道令牌（命令表之外）
// ============================================================================

/// 设备拒绝本次连接
pub const CONN_ERR: &str = "CONN_ERR";

/// 未识别的命令
pub const CMD_ERR: &str = "CMD_ERR";

/// 未建立会话时收到断开请求
pub const DISCONN_ERR: &str = "DISCONN_ERR";

// ============================================================================
// 图片通道令牌
// ============================================================================

/// 客户端请求图片
pub const PICTURE: &str = "PICTURE";

/// 设备就绪，随后发送原始图片字节
pub const PICTURE_OK: &str = "PICTURE_OK";

/// 设备拒绝拍照（faulty 模式）
pub const PICTURE_KO: &str = "PICTURE_KO";

/// 请求无效或当前没有控制会话
pub const PICTURE_ERR: &str = "PICTURE_ERR";

/// 客户端已成功解码图片
pub const RECEIVED_OK: &str = "RECEIVED_OK";

/// 客户端解码失败，请求重发整帧
pub const RESEND_PICTURE: &str = "RESEND_PICTURE";

// ============================================================================
// 上限与默认值
// ============================================================================

/// 断开握手的最大尝试次数（含第一次）
pub const DISCONNECT_MAX_ATTEMPTS: usize = 5;

/// 控制器默认心跳间隔
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(10);

/// 单行最大长度（字节，不含换行）
///
/// 最长的合法令牌是 `ROTATE_RIGHT_OK`，这里留足余量，只用于拒绝异常对端。
pub const MAX_LINE_LEN: usize = 256;

/// mDNS 服务类型
pub const SERVICE_TYPE: &str = "_robopi._tcp.local.";

/// 判断图片通道应答是否为显式拒绝
pub fn is_picture_rejection(token: &str) -> bool {
    token == PICTURE_KO || token == PICTURE_ERR
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ports_are_distinct() {
        assert_ne!(CONTROL_PORT, PICTURE_PORT);
        assert_eq!(CONTROL_PORT, 2025);
        assert_eq!(PICTURE_PORT, 2026);
    }

    #[test]
    fn test_picture_rejection_tokens() {
        assert!(is_picture_rejection(PICTURE_KO));
        assert!(is_picture_rejection(PICTURE_ERR));
        assert!(!is_picture_rejection(PICTURE_OK));
        assert!(!is_picture_rejection("PICTURE_KO "));
    }
}
