//! 图片通道帧边界
//!
//! 设备在 `PICTURE_OK` 之后发送一整帧编码后的图片，没有长度前缀。
//! 接收端只能依靠格式自身的结束标记判断一帧是否完整：
//!
//! - JPEG：EOI 标记 `FF D9`
//! - PNG：`IEND` 块（长度 0 + `IEND` + CRC `AE 42 60 82`）
//!
//! 结束标记之后允许出现全零填充（部分设备按块对齐发送）。

// ============================================================================
// 格式标记
// ============================================================================

/// JPEG SOI 标记
pub const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];

/// JPEG EOI 标记
pub const JPEG_EOI: [u8; 2] = [0xFF, 0xD9];

/// PNG 文件签名
pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// PNG `IEND` 块（固定 12 字节）
pub const PNG_IEND: [u8; 12] = [
    0x00, 0x00, 0x00, 0x00, b'I', b'E', b'N', b'D', 0xAE, 0x42, 0x60, 0x82,
];

/// 图片帧编码格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FrameFormat {
    Jpeg,
    Png,
}

impl FrameFormat {
    /// 根据帧头识别格式
    ///
    /// 字节不足以判断时返回 `None`。
    pub fn sniff(bytes: &[u8]) -> Option<FrameFormat> {
        if bytes.starts_with(&PNG_SIGNATURE) {
            Some(FrameFormat::Png)
        } else if bytes.starts_with(&JPEG_SOI) {
            Some(FrameFormat::Jpeg)
        } else {
            None
        }
    }

    /// 该格式的结束标记
    pub fn trailer(self) -> &'static [u8] {
        match self {
            FrameFormat::Jpeg => &JPEG_EOI,
            FrameFormat::Png => &PNG_IEND,
        }
    }

    /// 常用文件扩展名
    pub fn extension(self) -> &'static str {
        match self {
            FrameFormat::Jpeg => "jpg",
            FrameFormat::Png => "png",
        }
    }
}

/// 去掉末尾的全零填充
pub fn trim_padding(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    &bytes[..end]
}

/// 累积缓冲区中是否已经是一整帧
///
/// 返回去掉填充后的帧长度；格式无法识别、或结束标记还没到时返回 `None`。
/// 只做边界判断，帧内容是否可解码由上层决定。
///
/// ```rust
/// use robopi_protocol::frame_len;
///
/// assert_eq!(frame_len(&[0xFF, 0xD8, 0x01, 0xFF, 0xD9, 0, 0]), Some(5));
/// assert_eq!(frame_len(&[0xFF, 0xD8, 0x01]), None);
/// ```
pub fn frame_len(bytes: &[u8]) -> Option<usize> {
    let format = FrameFormat::sniff(bytes)?;
    let trimmed = trim_padding(bytes);
    let trailer = format.trailer();

    // 帧头和帧尾不能重叠
    let header_len = match format {
        FrameFormat::Jpeg => JPEG_SOI.len(),
        FrameFormat::Png => PNG_SIGNATURE.len(),
    };
    if trimmed.len() < header_len + trailer.len() {
        return None;
    }

    trimmed.ends_with(trailer).then_some(trimmed.len())
}
