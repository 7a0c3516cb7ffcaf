//! 配置管理命令
//!
//! 持久化默认连接参数（主机、TLS 信任锚、心跳间隔等）

use anyhow::{Context, Result};
use clap::Subcommand;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// 配置文件路径
fn config_dir() -> Result<PathBuf> {
    let mut path = dirs::config_dir().ok_or_else(|| anyhow::anyhow!("无法确定配置目录"))?;

    path.push("robopi");
    Ok(path)
}

pub fn config_file() -> Result<PathBuf> {
    let mut path = config_dir()?;
    path.push("config.toml");
    Ok(path)
}

/// CLI 配置
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// 上次连接的主机
    pub host: Option<String>,

    /// TLS 信任锚（PEM）
    pub tls_ca: Option<PathBuf>,

    /// 校验证书时使用的服务器名
    pub server_name: Option<String>,

    /// 心跳间隔（秒）
    pub keepalive_secs: Option<u64>,

    /// 控制通道端口
    pub control_port: Option<u16>,

    /// 图片通道端口
    pub picture_port: Option<u16>,

    /// mDNS 无结果时使用的固定主机列表
    pub hosts: Vec<String>,
}

impl CliConfig {
    /// 加载配置
    pub fn load() -> Result<Self> {
        Self::load_from(&config_file()?)
    }

    /// 保存配置
    pub fn save(&self) -> Result<()> {
        self.save_to(&config_file()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).context("读取配置文件失败")?;
        toml::from_str(&content).with_context(|| format!("解析配置文件失败: {}", path.display()))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("创建配置目录失败")?;
        }

        let content = toml::to_string_pretty(self).context("序列化配置失败")?;
        fs::write(path, format!("# RoboPi CLI Configuration\n\n{content}"))
            .context("写入配置文件失败")?;

        Ok(())
    }

    /// 按名称读取单个配置项
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "host" => self.host.clone(),
            "tls_ca" => self.tls_ca.as_ref().map(|p| p.display().to_string()),
            "server_name" => self.server_name.clone(),
            "keepalive_secs" => self.keepalive_secs.map(|v| v.to_string()),
            "control_port" => self.control_port.map(|v| v.to_string()),
            "picture_port" => self.picture_port.map(|v| v.to_string()),
            "hosts" if !self.hosts.is_empty() => Some(self.hosts.join(",")),
            _ => None,
        }
    }

    fn print(&self) {
        println!("  主机: {:?}", self.host);
        println!("  TLS 信任锚: {:?}", self.tls_ca);
        println!("  服务器名: {:?}", self.server_name);
        println!("  心跳间隔(秒): {:?}", self.keepalive_secs);
        println!("  控制端口: {:?}", self.control_port);
        println!("  图片端口: {:?}", self.picture_port);
        println!("  固定主机: {:?}", self.hosts);
    }
}

/// 配置命令
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 设置配置项
    Set {
        /// 默认主机
        #[arg(long)]
        host: Option<String>,

        /// TLS 信任锚文件（PEM）
        #[arg(long)]
        tls_ca: Option<PathBuf>,

        /// 证书校验使用的服务器名
        #[arg(long)]
        server_name: Option<String>,

        /// 心跳间隔（秒）
        #[arg(long)]
        keepalive_secs: Option<u64>,

        /// 控制通道端口
        #[arg(long)]
        control_port: Option<u16>,

        /// 图片通道端口
        #[arg(long)]
        picture_port: Option<u16>,

        /// 固定主机（可重复）
        #[arg(long = "static-host")]
        hosts: Vec<String>,
    },

    /// 获取配置项
    Get {
        /// 配置项名称
        #[arg(default_value = "all")]
        key: String,
    },

    /// 检查配置
    Check,
}

impl ConfigCommand {
    pub fn execute(self) -> Result<()> {
        let path = config_file()?;
        self.execute_at(&path)
    }

    fn execute_at(self, path: &Path) -> Result<()> {
        match self {
            ConfigCommand::Set {
                host,
                tls_ca,
                server_name,
                keepalive_secs,
                control_port,
                picture_port,
                hosts,
            } => {
                let mut config = CliConfig::load_from(path)?;

                if let Some(host) = host {
                    println!("✅ 设置默认主机: {}", host);
                    config.host = Some(host);
                }
                if let Some(tls_ca) = tls_ca {
                    println!("✅ 设置 TLS 信任锚: {}", tls_ca.display());
                    config.tls_ca = Some(tls_ca);
                }
                if let Some(name) = server_name {
                    println!("✅ 设置服务器名: {}", name);
                    config.server_name = Some(name);
                }
                if let Some(secs) = keepalive_secs {
                    anyhow::ensure!(secs > 0, "心跳间隔必须大于 0");
                    println!("✅ 设置心跳间隔: {}s", secs);
                    config.keepalive_secs = Some(secs);
                }
                if let Some(port) = control_port {
                    println!("✅ 设置控制端口: {}", port);
                    config.control_port = Some(port);
                }
                if let Some(port) = picture_port {
                    println!("✅ 设置图片端口: {}", port);
                    config.picture_port = Some(port);
                }
                if !hosts.is_empty() {
                    println!("✅ 设置固定主机: {}", hosts.join(", "));
                    config.hosts = hosts;
                }

                config.save_to(path)
            },

            ConfigCommand::Get { key } => {
                let config = CliConfig::load_from(path)?;
                if key == "all" {
                    println!("RoboPi CLI 配置:");
                    config.print();
                } else {
                    println!("{}", config.get(&key).unwrap_or_else(|| "(未设置)".into()));
                }
                Ok(())
            },

            ConfigCommand::Check => {
                let config = CliConfig::load_from(path)?;
                println!("配置文件: {}", path.display());
                config.print();

                if let Some(ca) = &config.tls_ca {
                    robopi_sdk::TlsClientSettings::from_file(ca)
                        .with_context(|| format!("无法加载 TLS 信任锚: {}", ca.display()))?;
                    println!("✅ TLS 信任锚可用");
                }
                Ok(())
            },
        }
    }
}
