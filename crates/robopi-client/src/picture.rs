//! 图片传输
//!
//! 在第二条 TCP/TLS 连接上取一张静态图片。流程：
//!
//! 1. 发送 `PICTURE`，读一行应答（`PICTURE_OK` 表示随后是原始字节）
//! 2. 累积字节，一旦出现完整帧（见 [`frame_len`]）就尝试解码
//! 3. 解码成功：发送 `RECEIVED_OK`
//! 4. 流安静下来但缓冲区仍无法解码：发送 `RESEND_PICTURE`，清空缓冲区重来
//!
//! 重发次数有上限，超过后放弃。缓冲区为空时无限等待（设备可能还在拍照）。

use crate::connection::{ConnectOptions, open_stream};
use crate::error::CommError;
use parking_lot::Mutex;
use robopi_net::{LineStream, NetError, is_timeout};
use robopi_protocol::{
    FrameFormat, PICTURE, PICTURE_OK, RECEIVED_OK, RESEND_PICTURE, frame_len, is_picture_rejection,
};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// 单次读取的块大小
const CHUNK_SIZE: usize = 16 * 1024;

/// 默认单帧上限
pub const DEFAULT_MAX_FRAME_LEN: usize = 8 * 1024 * 1024;

/// 图片传输参数
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PictureConfig {
    /// 缓冲区非空时流保持安静多久即判定本帧已经发完
    pub settle_timeout: Duration,
    /// 最多请求重发的次数
    pub max_resends: usize,
    /// 单帧（含填充）的最大字节数，超过即放弃本次传输
    pub max_frame_len: usize,
}

impl Default for PictureConfig {
    fn default() -> Self {
        Self {
            settle_timeout: Duration::from_millis(500),
            max_resends: 5,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

/// 解码成功的图片
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Picture {
    bytes: Vec<u8>,
    format: FrameFormat,
    width: u32,
    height: u32,
}

impl Picture {
    /// 校验并解码一帧
    pub fn decode(bytes: Vec<u8>) -> Result<Self, image::ImageError> {
        let img = image::load_from_memory(&bytes)?;
        let format = FrameFormat::sniff(&bytes).unwrap_or(FrameFormat::Png);
        Ok(Self {
            width: img.width(),
            height: img.height(),
            bytes,
            format,
        })
    }

    /// 设备发送的原始编码字节
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn format(&self) -> FrameFormat {
        self.format
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// 建议的文件名（`picture.jpg` / `picture.png`）
    pub fn file_name(&self) -> String {
        format!("picture.{}", self.format.extension())
    }

    /// 原样写入文件
    pub fn save(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        std::fs::write(path, &self.bytes)
    }
}

/// 单次拍照请求的会话（成功或放弃后关闭）
#[derive(Debug)]
pub struct PictureSession {
    stream: LineStream,
    ready: bool,
    accumulator: Vec<u8>,
}

impl PictureSession {
    pub fn new(stream: LineStream) -> Self {
        Self {
            stream,
            ready: false,
            accumulator: Vec::new(),
        }
    }

    /// 设备是否已回复 `PICTURE_OK`
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    fn io_error(e: impl Into<NetError>) -> CommError {
        CommError::cant_connect("picture channel I/O failed", e.into())
    }

    /// 发送 `PICTURE` 并读取应答
    pub fn request(&mut self) -> Result<(), CommError> {
        self.stream.write_line(PICTURE).map_err(Self::io_error)?;
        let reply = self.stream.read_line().map_err(Self::io_error)?;

        if reply == PICTURE_OK {
            self.ready = true;
            Ok(())
        } else if is_picture_rejection(&reply) {
            warn!("Device rejected picture request: {}", reply);
            Err(CommError::PictureTransfer(format!(
                "device rejected picture request ({reply})"
            )))
        } else {
            Err(CommError::Robot {
                command: PICTURE.to_string(),
                reply,
            })
        }
    }

    /// 接收一帧，必要时请求重发
    pub fn receive(&mut self, config: &PictureConfig) -> Result<Picture, CommError> {
        if !self.ready {
            return Err(CommError::PictureTransfer(
                "picture channel is not ready".to_string(),
            ));
        }

        let mut resends = 0;
        let mut chunk = vec![0u8; CHUNK_SIZE];
        loop {
            let timeout = if self.accumulator.is_empty() {
                None
            } else {
                Some(config.settle_timeout)
            };
            self.stream
                .set_read_timeout(timeout)
                .map_err(Self::io_error)?;

            match self.stream.read_raw(&mut chunk) {
                Ok(0) => {
                    return Err(CommError::PictureTransfer(if self.accumulator.is_empty() {
                        "device closed the picture channel before sending a frame".to_string()
                    } else {
                        format!(
                            "picture channel closed mid-frame ({} bytes received)",
                            self.accumulator.len()
                        )
                    }));
                },
                Ok(n) => {
                    let chunk = &chunk[..n];
                    self.accumulator.extend_from_slice(chunk);
                    if self.accumulator.len() > config.max_frame_len {
                        let received = self.accumulator.len();
                        self.accumulator = Vec::new();
                        warn!(
                            "Frame exceeds {} bytes without a trailer, giving up",
                            config.max_frame_len
                        );
                        return Err(CommError::PictureTransfer(format!(
                            "frame exceeds {} bytes ({received} bytes received)",
                            config.max_frame_len
                        )));
                    }
                    // 全零块只会延长填充，帧边界不变
                    if chunk.iter().all(|&b| b == 0) {
                        continue;
                    }
                    if let Some(picture) = self.try_decode() {
                        self.stream.set_read_timeout(None).map_err(Self::io_error)?;
                        self.stream.write_line(RECEIVED_OK).map_err(Self::io_error)?;
                        info!(
                            "Picture received: {:?} {}x{} ({} bytes, {} resends)",
                            picture.format(),
                            picture.width(),
                            picture.height(),
                            picture.bytes().len(),
                            resends
                        );
                        return Ok(picture);
                    }
                },
                Err(e) if is_timeout(&e) => {
                    if resends >= config.max_resends {
                        return Err(CommError::PictureTransfer(format!(
                            "picture still corrupt after {resends} resend requests"
                        )));
                    }
                    resends += 1;
                    warn!(
                        "Undecodable frame ({} bytes), requesting resend {}/{}",
                        self.accumulator.len(),
                        resends,
                        config.max_resends
                    );
                    self.accumulator.clear();
                    self.stream
                        .write_line(RESEND_PICTURE)
                        .map_err(Self::io_error)?;
                },
                Err(e) => return Err(Self::io_error(e)),
            }
        }
    }

    fn try_decode(&self) -> Option<Picture> {
        let len = frame_len(&self.accumulator)?;
        match Picture::decode(self.accumulator[..len].to_vec()) {
            Ok(picture) => Some(picture),
            Err(e) => {
                debug!("Frame boundary found but decoding failed: {}", e);
                None
            },
        }
    }

    pub fn close(&mut self) {
        self.stream.close();
    }
}

/// 图片传输（独立于控制通道交换锁的自有锁）
#[derive(Debug)]
pub struct PictureTransfer {
    lock: Mutex<()>,
    options: ConnectOptions,
    config: PictureConfig,
}

impl PictureTransfer {
    pub fn new(options: ConnectOptions, config: PictureConfig) -> Self {
        Self {
            lock: Mutex::new(()),
            options,
            config,
        }
    }

    pub fn config(&self) -> &PictureConfig {
        &self.config
    }

    /// 取一张图片
    ///
    /// 控制通道未连接时直接返回 [`CommError::CantConnect`]。
    pub fn fetch(&self, host: &str, control_connected: bool) -> Result<Picture, CommError> {
        let _guard = self.lock.lock();
        if !control_connected {
            return Err(CommError::not_connected());
        }

        let port = self.options.picture_port;
        let stream = open_stream(host, port, &self.options).map_err(|e| {
            CommError::cant_connect(format!("cannot reach picture service {host}:{port}"), e)
        })?;
        debug!("Picture channel open to {}", stream.peer());

        let mut session = PictureSession::new(stream);
        let result = session
            .request()
            .and_then(|_| session.receive(&self.config));
        session.close();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CommErrorKind;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::{BufRead, BufReader, Cursor, Write};
    use std::net::TcpListener;
    use std::thread;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([200, 30, 30]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    /// 帧边界完整但内容损坏
    fn corrupt(frame: &[u8]) -> Vec<u8> {
        let mut bad = frame.to_vec();
        for b in &mut bad[16..32] {
            *b ^= 0xA5;
        }
        bad
    }

    /// 桩图片服务：应答 `reply`，然后依次发送 `frames`，每发一帧读一行客户端回复
    fn picture_stub(
        reply: &'static str,
        frames: Vec<Vec<u8>>,
    ) -> (u16, thread::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = thread::spawn(move || {
            let (sock, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(sock.try_clone().unwrap());
            let mut received = Vec::new();
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            received.push(line.trim_end().to_string());
            (&sock).write_all(format!("{reply}\n").as_bytes()).unwrap();

            for frame in frames {
                if (&sock).write_all(&frame).is_err() {
                    break;
                }
                line.clear();
                if reader.read_line(&mut line).unwrap_or(0) == 0 {
                    break;
                }
                received.push(line.trim_end().to_string());
            }
            received
        });
        (port, handle)
    }

    fn transfer(port: u16) -> PictureTransfer {
        let options = ConnectOptions {
            picture_port: port,
            ..ConnectOptions::default()
        };
        let config = PictureConfig {
            settle_timeout: Duration::from_millis(100),
            max_resends: 2,
            ..PictureConfig::default()
        };
        PictureTransfer::new(options, config)
    }

    #[test]
    fn test_fetch_decodes_picture() {
        let frame = png(8, 6);
        let (port, stub) = picture_stub("PICTURE_OK", vec![frame.clone()]);

        let picture = transfer(port).fetch("127.0.0.1", true).unwrap();
        assert_eq!(picture.format(), FrameFormat::Png);
        assert_eq!((picture.width(), picture.height()), (8, 6));
        assert_eq!(picture.bytes(), frame.as_slice());
        assert_eq!(picture.file_name(), "picture.png");

        assert_eq!(stub.join().unwrap(), vec!["PICTURE", "RECEIVED_OK"]);
    }

    #[test]
    fn test_fetch_requires_control_connection() {
        let err = transfer(1).fetch("127.0.0.1", false).unwrap_err();
        assert_eq!(err.kind(), CommErrorKind::CantConnect);
    }

    #[test]
    fn test_fetch_rejected() {
        for token in ["PICTURE_KO", "PICTURE_ERR"] {
            let (port, stub) = picture_stub(token, vec![]);
            let err = transfer(port).fetch("127.0.0.1", true).unwrap_err();
            assert_eq!(err.kind(), CommErrorKind::PictureTransferError);
            stub.join().unwrap();
        }
    }

    #[test]
    fn test_fetch_unexpected_reply_is_robot_error() {
        let (port, stub) = picture_stub("HELLO", vec![]);
        let err = transfer(port).fetch("127.0.0.1", true).unwrap_err();
        assert_eq!(err.kind(), CommErrorKind::RobotError);
        stub.join().unwrap();
    }

    #[test]
    fn test_fetch_resends_corrupt_frame() {
        let frame = png(4, 4);
        let (port, stub) = picture_stub("PICTURE_OK", vec![corrupt(&frame), frame]);

        let picture = transfer(port).fetch("127.0.0.1", true).unwrap();
        assert_eq!(picture.width(), 4);
        assert_eq!(
            stub.join().unwrap(),
            vec!["PICTURE", "RESEND_PICTURE", "RECEIVED_OK"]
        );
    }

    #[test]
    fn test_fetch_gives_up_after_max_resends() {
        let bad = corrupt(&png(4, 4));
        let (port, stub) = picture_stub("PICTURE_OK", vec![bad.clone(), bad.clone(), bad]);

        let err = transfer(port).fetch("127.0.0.1", true).unwrap_err();
        assert_eq!(err.kind(), CommErrorKind::PictureTransferError);
        assert_eq!(
            stub.join().unwrap(),
            vec!["PICTURE", "RESEND_PICTURE", "RESEND_PICTURE"]
        );
    }

    #[test]
    fn test_fetch_eof_mid_frame() {
        let frame = png(4, 4);
        let partial = frame[..frame.len() / 2].to_vec();
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let stub = thread::spawn(move || {
            let (sock, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(sock.try_clone().unwrap());
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            (&sock).write_all(b"PICTURE_OK\n").unwrap();
            (&sock).write_all(&partial).unwrap();
        });

        // 设备关闭前的数据全部到达，设置足够长的静默期以观察 EOF
        let options = ConnectOptions {
            picture_port: port,
            ..ConnectOptions::default()
        };
        let config = PictureConfig {
            settle_timeout: Duration::from_secs(5),
            max_resends: 1,
            ..PictureConfig::default()
        };
        let err = PictureTransfer::new(options, config)
            .fetch("127.0.0.1", true)
            .unwrap_err();
        assert_eq!(err.kind(), CommErrorKind::PictureTransferError);
        stub.join().unwrap();
    }

    #[test]
    fn test_padded_frame_is_accepted() {
        let frame = png(3, 2);
        let mut padded = frame.clone();
        padded.extend_from_slice(&[0; 64]);
        let (port, stub) = picture_stub("PICTURE_OK", vec![padded]);

        let picture = transfer(port).fetch("127.0.0.1", true).unwrap();
        assert_eq!(picture.bytes(), frame.as_slice());
        stub.join().unwrap();
    }

    /// 设备发送帧头后不断输出、永远没有帧尾：到达单帧上限即放弃，内存不随之增长
    #[test]
    fn test_endless_frame_hits_size_limit() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let stub = thread::spawn(move || {
            let (sock, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(sock.try_clone().unwrap());
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            (&sock).write_all(b"PICTURE_OK\n").unwrap();
            (&sock).write_all(&robopi_protocol::picture::PNG_SIGNATURE).unwrap();

            // 客户端关闭连接后写入失败，返回已发送的字节数
            let block = vec![0x01u8; 64 * 1024];
            let mut sent = 0usize;
            while (&sock).write_all(&block).is_ok() {
                sent += block.len();
            }
            sent
        });

        let options = ConnectOptions {
            picture_port: port,
            ..ConnectOptions::default()
        };
        let config = PictureConfig {
            settle_timeout: Duration::from_secs(5),
            max_resends: 3,
            max_frame_len: 256 * 1024,
        };
        let err = PictureTransfer::new(options, config)
            .fetch("127.0.0.1", true)
            .unwrap_err();
        assert_eq!(err.kind(), CommErrorKind::PictureTransferError);
        assert!(err.to_string().contains("exceeds"), "{err}");

        // 设备在客户端放弃后很快写失败，而不是被无限缓冲
        assert!(stub.join().unwrap() < 64 * 1024 * 1024);
    }

    /// 帧尾之后的大量补零只延长填充，不影响识别
    #[test]
    fn test_long_zero_padding_in_many_chunks() {
        let frame = png(3, 2);
        let mut padded = frame.clone();
        padded.extend_from_slice(&[0; 512 * 1024]);
        let (port, stub) = picture_stub("PICTURE_OK", vec![padded]);

        let picture = transfer(port).fetch("127.0.0.1", true).unwrap();
        assert_eq!(picture.bytes(), frame.as_slice());
        stub.join().unwrap();
    }

    #[test]
    fn test_default_frame_limit() {
        assert_eq!(PictureConfig::default().max_frame_len, DEFAULT_MAX_FRAME_LEN);
        assert!(DEFAULT_MAX_FRAME_LEN > CHUNK_SIZE);
    }

    #[test]
    fn test_save_writes_raw_bytes() {
        let picture = Picture::decode(png(2, 2)).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(picture.file_name());
        picture.save(&path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), picture.bytes());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(Picture::decode(b"not an image".to_vec()).is_err());
    }
}
