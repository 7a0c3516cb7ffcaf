//! 连接参数
//!
//! 命令行参数优先，其次是配置文件，最后是协议默认值。

use anyhow::{Context, Result};
use clap::Args;
use robopi_sdk::{ControllerBuilder, TlsClientSettings};
use std::path::PathBuf;
use std::time::Duration;

use super::config::CliConfig;

#[derive(Args, Debug, Clone, Default)]
pub struct ConnectArgs {
    /// 机器人主机名或 IP（默认使用配置中的上次主机）
    #[arg(long)]
    pub host: Option<String>,

    /// TLS 信任锚文件（PEM），给出即启用 TLS
    #[arg(long)]
    pub tls_ca: Option<PathBuf>,

    /// 证书校验使用的服务器名
    #[arg(long)]
    pub server_name: Option<String>,

    /// 控制通道端口
    #[arg(long)]
    pub control_port: Option<u16>,

    /// 图片通道端口
    #[arg(long)]
    pub picture_port: Option<u16>,

    /// 心跳间隔（秒）
    #[arg(long)]
    pub keepalive_secs: Option<u64>,
}

impl ConnectArgs {
    /// 目标主机
    pub fn host(&self, config: &CliConfig) -> Result<String> {
        self.host
            .clone()
            .or_else(|| config.host.clone())
            .ok_or_else(|| anyhow::anyhow!("未指定主机，请使用 --host 或 `config set --host`"))
    }

    /// 合并配置后的控制器 Builder
    pub fn builder(&self, config: &CliConfig) -> Result<ControllerBuilder> {
        let mut builder = ControllerBuilder::new();

        if let Some(port) = self.control_port.or(config.control_port) {
            builder = builder.control_port(port);
        }
        if let Some(port) = self.picture_port.or(config.picture_port) {
            builder = builder.picture_port(port);
        }
        if let Some(secs) = self.keepalive_secs.or(config.keepalive_secs) {
            anyhow::ensure!(secs > 0, "心跳间隔必须大于 0");
            builder = builder.keepalive_interval(Duration::from_secs(secs));
        }

        if let Some(ca) = self.tls_ca.as_ref().or(config.tls_ca.as_ref()) {
            let mut tls = TlsClientSettings::from_file(ca)
                .with_context(|| format!("无法加载 TLS 信任锚: {}", ca.display()))?;
            if let Some(name) = self.server_name.as_ref().or(config.server_name.as_ref()) {
                tls = tls.with_server_name(name.clone());
            }
            builder = builder.tls(tls);
        }

        Ok(builder)
    }
}
