//! 设备配置

use crate::error::DeviceError;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use robopi_net::TlsServerSettings;
use robopi_protocol::{CONTROL_PORT, FrameFormat, PICTURE_PORT};
use std::io::Cursor;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

/// 应答忠实度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FidelityMode {
    /// 每个命令都回复正确的确认令牌
    #[default]
    Faithful,
    /// 每个命令都回复 `<VERB>_KO`（`DISCONN` 除外），拍照请求回复 `PICTURE_KO`
    Faulty,
}

/// 图片来源
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PictureSource {
    /// 启动时读入的 JPEG / PNG 文件
    File(PathBuf),
    /// 生成的 PNG 测试图案
    TestPattern { width: u32, height: u32 },
}

impl Default for PictureSource {
    fn default() -> Self {
        PictureSource::TestPattern {
            width: 320,
            height: 240,
        }
    }
}

impl PictureSource {
    /// 加载（或生成）一帧编码后的图片
    pub fn load(&self) -> Result<Vec<u8>, DeviceError> {
        match self {
            PictureSource::File(path) => {
                let bytes = std::fs::read(path).map_err(|e| {
                    DeviceError::Picture(format!("failed to read {}: {e}", path.display()))
                })?;
                match FrameFormat::sniff(&bytes) {
                    Some(format) => debug!("Loaded {:?} picture from {}", format, path.display()),
                    None => warn!(
                        "{} is neither JPEG nor PNG, clients will not find a frame boundary",
                        path.display()
                    ),
                }
                Ok(bytes)
            },
            PictureSource::TestPattern { width, height } => test_pattern(*width, *height),
        }
    }
}

/// 渐变测试图案
fn test_pattern(width: u32, height: u32) -> Result<Vec<u8>, DeviceError> {
    if width == 0 || height == 0 {
        return Err(DeviceError::Picture(format!(
            "invalid test pattern size {width}x{height}"
        )));
    }

    let img = RgbImage::from_fn(width, height, |x, y| {
        let r = (x * 255 / width) as u8;
        let g = (y * 255 / height) as u8;
        let b = if (x / 16 + y / 16) % 2 == 0 { 200 } else { 40 };
        Rgb([r, g, b])
    });

    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut out, ImageFormat::Png)
        .map_err(|e| DeviceError::Picture(format!("failed to encode test pattern: {e}")))?;
    Ok(out.into_inner())
}

/// 设备配置
///
/// 端口为 0 时由系统分配（测试使用）。
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// 监听地址
    pub bind_addr: IpAddr,
    /// 控制通道端口
    pub control_port: u16,
    /// 图片通道端口
    pub picture_port: u16,
    /// 应答忠实度
    pub mode: FidelityMode,
    /// 测试夹具专用：faithful 模式收到 `STOP`、faulty 模式收到 `DISCONN` 时，
    /// 应答后停止整个设备
    pub harness_exit: bool,
    /// 图片来源
    pub picture: PictureSource,
    /// 每次拍照请求最多响应的重发次数
    pub max_resends_served: usize,
    /// 故障注入：前 N 次发送的帧内容被破坏（帧头帧尾保留）
    pub corrupt_transmissions: usize,
    /// 按块大小用零填充每一帧（`None` 表示不填充）
    pub pad_to_block: Option<usize>,
    /// TLS 设置（`None` 表示明文）
    pub tls: Option<TlsServerSettings>,
    /// 监听线程轮询 accept 与运行标志的间隔
    pub poll_interval: Duration,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            control_port: CONTROL_PORT,
            picture_port: PICTURE_PORT,
            mode: FidelityMode::Faithful,
            harness_exit: false,
            picture: PictureSource::default(),
            max_resends_served: 5,
            corrupt_transmissions: 0,
            pad_to_block: None,
            tls: None,
            poll_interval: Duration::from_millis(20),
        }
    }
}

impl DeviceConfig {
    /// 回环地址 + 系统分配端口
    pub fn ephemeral() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            control_port: 0,
            picture_port: 0,
            ..Self::default()
        }
    }

    pub fn with_mode(mut self, mode: FidelityMode) -> Self {
        self.mode = mode;
        self
    }
}
