//! 局域网设备发现命令
//!
//! 通过 mDNS 浏览 `_robopi._tcp.local.`，没有结果时退回配置中的固定主机。

use anyhow::Result;
use clap::Args;
use mdns_sd::{ServiceDaemon, ServiceEvent};
use robopi_sdk::client::{CommError, Discovery, StaticDiscovery};
use robopi_sdk::protocol::SERVICE_TYPE;
use std::collections::BTreeSet;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::config::CliConfig;

/// mDNS 发现
pub struct MdnsDiscovery {
    service_type: String,
}

impl MdnsDiscovery {
    pub fn new() -> Self {
        Self {
            service_type: SERVICE_TYPE.to_string(),
        }
    }
}

impl Default for MdnsDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

fn mdns_error(e: mdns_sd::Error) -> CommError {
    CommError::CantConnect {
        reason: format!("mDNS: {e}"),
        source: None,
    }
}

impl Discovery for MdnsDiscovery {
    fn discover(&self, timeout: Duration) -> Result<BTreeSet<String>, CommError> {
        let daemon = ServiceDaemon::new().map_err(mdns_error)?;
        let receiver = daemon.browse(&self.service_type).map_err(mdns_error)?;

        let deadline = Instant::now() + timeout;
        let mut hosts = BTreeSet::new();
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match receiver.recv_timeout(remaining) {
                Ok(ServiceEvent::ServiceResolved(info)) => {
                    debug!("Service resolved: {}", info.get_fullname());
                    hosts.extend(info.get_addresses().iter().map(|addr| addr.to_string()));
                },
                Ok(other) => debug!("mDNS event: {:?}", other),
                Err(_) => break,
            }
        }

        if let Err(e) = daemon.stop_browse(&self.service_type) {
            warn!("Failed to stop mDNS browse: {}", e);
        }
        if let Err(e) = daemon.shutdown() {
            warn!("Failed to shut down mDNS daemon: {}", e);
        }

        info!("mDNS discovery found {} host(s)", hosts.len());
        Ok(hosts)
    }
}

/// 发现命令参数
#[derive(Args, Debug)]
pub struct DiscoverCommand {
    /// 等待时间（毫秒）
    #[arg(short, long, default_value_t = 3000)]
    pub timeout_ms: u64,

    /// 跳过 mDNS，只列出配置中的固定主机
    #[arg(long)]
    pub static_only: bool,
}

impl DiscoverCommand {
    pub fn execute(&self, config: &CliConfig) -> Result<()> {
        let timeout = Duration::from_millis(self.timeout_ms);

        let mut hosts = if self.static_only {
            BTreeSet::new()
        } else {
            println!("⏳ 搜索 {} ...", SERVICE_TYPE);
            match MdnsDiscovery::new().discover(timeout) {
                Ok(hosts) => hosts,
                Err(e) => {
                    warn!("{}", e);
                    BTreeSet::new()
                },
            }
        };

        if hosts.is_empty() {
            hosts = StaticDiscovery::new(config.hosts.iter().cloned()).discover(timeout)?;
        }

        if hosts.is_empty() {
            println!("未发现设备");
        } else {
            for host in &hosts {
                println!("{}", host);
            }
        }
        Ok(())
    }
}
