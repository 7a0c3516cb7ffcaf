//! 设备发现接口
//!
//! 核心库只定义接口；基于 mDNS 的实现在命令行工具中。

use crate::error::CommError;
use std::collections::BTreeSet;
use std::time::Duration;

/// 局域网设备发现
pub trait Discovery {
    /// 在 `timeout` 内收集可连接的主机地址
    fn discover(&self, timeout: Duration) -> Result<BTreeSet<String>, CommError>;
}

/// 固定主机列表（配置文件或命令行给出）
#[derive(Debug, Clone, Default)]
pub struct StaticDiscovery {
    hosts: BTreeSet<String>,
}

impl StaticDiscovery {
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            hosts: hosts.into_iter().map(Into::into).collect(),
        }
    }
}

impl Discovery for StaticDiscovery {
    fn discover(&self, _timeout: Duration) -> Result<BTreeSet<String>, CommError> {
        Ok(self.hosts.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_discovery_deduplicates_and_sorts() {
        let discovery = StaticDiscovery::new(["192.168.1.20", "192.168.1.10", "192.168.1.20"]);
        let hosts = discovery.discover(Duration::ZERO).unwrap();
        assert_eq!(
            hosts.into_iter().collect::<Vec<_>>(),
            vec!["192.168.1.10", "192.168.1.20"]
        );
    }

    #[test]
    fn test_empty_discovery() {
        let hosts = StaticDiscovery::default()
            .discover(Duration::from_millis(10))
            .unwrap();
        assert!(hosts.is_empty());
    }
}
