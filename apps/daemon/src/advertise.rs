//! mDNS 服务广播
//!
//! 以 `_robopi._tcp.local.` 注册控制端口，守护进程退出时注销。

use anyhow::{Context, Result};
use mdns_sd::{ServiceDaemon, ServiceInfo};
use robopi_sdk::protocol::SERVICE_TYPE;
use std::collections::HashMap;
use tracing::{info, warn};

pub struct Advertisement {
    daemon: ServiceDaemon,
    fullname: String,
}

impl Advertisement {
    /// 注册服务；地址由 mdns-sd 按网卡自动填充
    pub fn register(instance: &str, port: u16) -> Result<Self> {
        let daemon = ServiceDaemon::new().context("failed to start mDNS daemon")?;

        let properties: HashMap<String, String> =
            HashMap::from([("version".to_string(), env!("CARGO_PKG_VERSION").to_string())]);
        let host_name = format!("{instance}.local.");
        let info = ServiceInfo::new(SERVICE_TYPE, instance, &host_name, "", port, properties)
            .context("invalid mDNS service info")?
            .enable_addr_auto();
        let fullname = info.get_fullname().to_string();

        daemon
            .register(info)
            .context("failed to register mDNS service")?;
        info!("Advertising {} on port {}", fullname, port);

        Ok(Self { daemon, fullname })
    }
}

impl Drop for Advertisement {
    fn drop(&mut self) {
        if let Err(e) = self.daemon.unregister(&self.fullname) {
            warn!("Failed to unregister {}: {}", self.fullname, e);
        }
        if let Err(e) = self.daemon.shutdown() {
            warn!("Failed to shut down mDNS daemon: {}", e);
        }
    }
}
