//! RoboPi 设备守护进程
//!
//! 在控制端口上运行会话分发器，在图片端口上提供静态图片，
//! Ctrl+C 时协作式停止两个监听线程。

mod advertise;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use robopi_sdk::{Device, DeviceConfig, FidelityMode, PictureSource, TlsServerSettings};
use robopi_sdk::protocol::{CONTROL_PORT, PICTURE_PORT};
use std::net::IpAddr;
use std::path::PathBuf;
use tracing::info;

use advertise::Advertisement;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// 回复正确的确认令牌
    Faithful,
    /// 回复 `<VERB>_KO`，拒绝拍照
    Faulty,
}

impl From<Mode> for FidelityMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Faithful => FidelityMode::Faithful,
            Mode::Faulty => FidelityMode::Faulty,
        }
    }
}

/// RoboPi 设备
#[derive(Parser, Debug)]
#[command(name = "robopi-daemon")]
#[command(about = "RoboPi device - control dispatcher and picture listener", long_about = None)]
#[command(version)]
struct Args {
    /// 监听地址
    #[arg(long, default_value = "0.0.0.0")]
    bind: IpAddr,

    /// 控制通道端口
    #[arg(long, default_value_t = CONTROL_PORT)]
    control_port: u16,

    /// 图片通道端口
    #[arg(long, default_value_t = PICTURE_PORT)]
    picture_port: u16,

    /// 应答模式
    #[arg(long, value_enum, default_value_t = Mode::Faithful)]
    mode: Mode,

    /// 图片文件（JPEG / PNG）；不指定时生成测试图案
    #[arg(long)]
    picture: Option<PathBuf>,

    /// 测试图案尺寸
    ///
    /// 格式: WIDTHxHEIGHT
    #[arg(long, default_value = "320x240", value_parser = parse_size)]
    pattern: (u32, u32),

    /// TLS 证书链（PEM），与 --tls-key 同时给出时启用 TLS
    #[arg(long, requires = "tls_key")]
    tls_cert: Option<PathBuf>,

    /// TLS 私钥（PEM）
    #[arg(long, requires = "tls_cert")]
    tls_key: Option<PathBuf>,

    /// 每次拍照请求最多响应的重发次数
    #[arg(long, default_value_t = 5)]
    max_resends: usize,

    /// 按块大小补零发送图片
    #[arg(long)]
    pad_block: Option<usize>,

    /// 故障注入：破坏前 N 次发送的图片内容
    #[arg(long, default_value_t = 0)]
    corrupt: usize,

    /// 测试夹具：faithful 收到 STOP、faulty 收到 DISCONN 后退出
    #[arg(long)]
    harness_exit: bool,

    /// 以给定实例名广播 mDNS 服务
    #[arg(long)]
    advertise: Option<String>,
}

fn parse_size(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {s:?}"))?;
    let w: u32 = w.trim().parse().map_err(|e| format!("invalid width: {e}"))?;
    let h: u32 = h.trim().parse().map_err(|e| format!("invalid height: {e}"))?;
    if w == 0 || h == 0 {
        return Err(format!("size must be non-zero, got {s:?}"));
    }
    Ok((w, h))
}

impl Args {
    fn into_config(self) -> Result<DeviceConfig> {
        let tls = match (&self.tls_cert, &self.tls_key) {
            (Some(cert), Some(key)) => Some(
                TlsServerSettings::from_files(cert, key)
                    .with_context(|| format!("failed to load TLS identity {}", cert.display()))?,
            ),
            _ => None,
        };

        let picture = match self.picture {
            Some(path) => PictureSource::File(path),
            None => PictureSource::TestPattern {
                width: self.pattern.0,
                height: self.pattern.1,
            },
        };

        Ok(DeviceConfig {
            bind_addr: self.bind,
            control_port: self.control_port,
            picture_port: self.picture_port,
            mode: self.mode.into(),
            harness_exit: self.harness_exit,
            picture,
            max_resends_served: self.max_resends,
            corrupt_transmissions: self.corrupt,
            pad_to_block: self.pad_block,
            tls,
            ..DeviceConfig::default()
        })
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("robopi_daemon=info".parse()?)
                .add_directive("robopi_device=info".parse()?),
        )
        .init();

    let mut args = Args::parse();
    let advertise = args.advertise.take();
    let config = args.into_config()?;
    let mode = config.mode;
    let tls = config.tls.is_some();

    let handle = Device::bind(config)?.spawn()?;
    info!(
        "RoboPi device running: control={} picture={} mode={:?} tls={}",
        handle.control_addr(),
        handle.picture_addr(),
        mode,
        tls
    );

    let _advertisement = match advertise {
        Some(instance) => Some(Advertisement::register(
            &instance,
            handle.control_addr().port(),
        )?),
        None => None,
    };

    let stopper = handle.stopper();
    ctrlc::set_handler(move || {
        eprintln!("\nReceived interrupt signal. Shutting down...");
        stopper.stop();
    })
    .context("failed to set signal handler")?;

    handle.join()?;
    info!("RoboPi device stopped");
    Ok(())
}
