//! TLS 1.3 配置
//!
//! 控制通道和图片通道只协商 TLS 1.3，且只允许 `TLS13_AES_256_GCM_SHA384` 一个套件。
//! 控制器侧的信任锚来自预先加载的 PEM 文件，不使用系统证书库。

use crate::NetError;
use crate::transport::Transport;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName};
use rustls::{
    ClientConfig, ClientConnection, CommonState, RootCertStore, ServerConfig, ServerConnection,
    StreamOwned,
};
use sha2::{Digest, Sha256};
use std::net::{SocketAddr, TcpStream};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// 只包含单一 TLS 1.3 套件的 ring provider
pub fn tls13_provider() -> rustls::crypto::CryptoProvider {
    let mut provider = rustls::crypto::ring::default_provider();
    provider.cipher_suites = vec![rustls::crypto::ring::cipher_suite::TLS13_AES_256_GCM_SHA384];
    provider
}

/// 证书 DER 的 SHA-256 指纹（小写十六进制）
pub fn fingerprint(cert_der: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(cert_der);
    hex::encode(hasher.finalize())
}

/// 从 PEM 数据加载证书链
pub fn load_certs(pem: &[u8]) -> Result<Vec<CertificateDer<'static>>, NetError> {
    let mut reader = std::io::BufReader::new(pem);
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| NetError::Certificate(format!("failed to parse certificate: {e}")))?;

    if certs.is_empty() {
        return Err(NetError::Certificate(
            "no certificates found in PEM data".to_string(),
        ));
    }
    Ok(certs)
}

/// 从 PEM 数据加载私钥（PKCS#8 / PKCS#1 / SEC1）
pub fn load_private_key(pem: &[u8]) -> Result<PrivateKeyDer<'static>, NetError> {
    let mut reader = std::io::BufReader::new(pem);
    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| NetError::Certificate(format!("failed to parse private key: {e}")))?
        .ok_or_else(|| NetError::Certificate("no private key found in PEM data".to_string()))
}

fn read_file(path: &Path) -> Result<Vec<u8>, NetError> {
    std::fs::read(path)
        .map_err(|e| NetError::Certificate(format!("failed to read {}: {e}", path.display())))
}

fn log_session(role: &str, peer: SocketAddr, state: &CommonState) {
    let version = state.protocol_version();
    let suite = state.negotiated_cipher_suite().map(|s| s.suite());
    info!(
        "TLS session established ({}): peer={}, version={:?}, suite={:?}",
        role, peer, version, suite
    );
    if let Some(certs) = state.peer_certificates() {
        for (i, cert) in certs.iter().enumerate() {
            debug!("Peer certificate #{}: sha256={}", i, fingerprint(cert.as_ref()));
        }
    }
}

// ============================================================================
// 控制器侧
// ============================================================================

/// 控制器侧 TLS 设置
#[derive(Debug, Clone)]
pub struct TlsClientSettings {
    config: Arc<ClientConfig>,
    server_name: Option<String>,
}

impl TlsClientSettings {
    /// 用 PEM 格式的信任锚构建
    pub fn from_pem(trust_anchors: &[u8]) -> Result<Self, NetError> {
        let mut roots = RootCertStore::empty();
        for cert in load_certs(trust_anchors)? {
            roots
                .add(cert)
                .map_err(|e| NetError::Certificate(format!("invalid trust anchor: {e}")))?;
        }

        let config = ClientConfig::builder_with_provider(Arc::new(tls13_provider()))
            .with_protocol_versions(&[&rustls::version::TLS13])?
            .with_root_certificates(roots)
            .with_no_client_auth();

        Ok(Self {
            config: Arc::new(config),
            server_name: None,
        })
    }

    /// 从 PEM 文件加载信任锚
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, NetError> {
        Self::from_pem(&read_file(path.as_ref())?)
    }

    /// 覆盖证书校验使用的服务器名（默认使用连接的主机名）
    pub fn with_server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = Some(name.into());
        self
    }

    pub fn server_name(&self) -> Option<&str> {
        self.server_name.as_deref()
    }

    /// 在已建立的 TCP 连接上完成 TLS 握手
    pub fn connect(&self, host: &str, mut tcp: TcpStream) -> Result<Transport, NetError> {
        let name = self
            .server_name
            .clone()
            .unwrap_or_else(|| host.to_string());
        let server_name =
            ServerName::try_from(name.clone()).map_err(|_| NetError::InvalidServerName(name))?;

        let peer = tcp.peer_addr()?;
        let mut conn = ClientConnection::new(self.config.clone(), server_name)?;
        while conn.is_handshaking() {
            conn.complete_io(&mut tcp)?;
        }
        // 客户端 Finished 可能还在发送队列里
        if conn.wants_write() {
            conn.complete_io(&mut tcp)?;
        }

        log_session("client", peer, &conn);
        Ok(Transport::TlsClient(Box::new(StreamOwned::new(conn, tcp))))
    }
}

// ============================================================================
// 设备侧
// ============================================================================

/// 设备侧 TLS 设置（证书链 + 私钥）
#[derive(Debug, Clone)]
pub struct TlsServerSettings {
    config: Arc<ServerConfig>,
}

impl TlsServerSettings {
    pub fn from_pem(cert_chain: &[u8], private_key: &[u8]) -> Result<Self, NetError> {
        let certs = load_certs(cert_chain)?;
        let key = load_private_key(private_key)?;

        let config = ServerConfig::builder_with_provider(Arc::new(tls13_provider()))
            .with_protocol_versions(&[&rustls::version::TLS13])?
            .with_no_client_auth()
            .with_single_cert(certs, key)?;

        Ok(Self {
            config: Arc::new(config),
        })
    }

    pub fn from_files(
        cert_path: impl AsRef<Path>,
        key_path: impl AsRef<Path>,
    ) -> Result<Self, NetError> {
        Self::from_pem(
            &read_file(cert_path.as_ref())?,
            &read_file(key_path.as_ref())?,
        )
    }

    /// 在已接受的 TCP 连接上完成 TLS 握手
    pub fn accept(&self, mut tcp: TcpStream) -> Result<Transport, NetError> {
        let peer = tcp.peer_addr()?;
        let mut conn = ServerConnection::new(self.config.clone())?;
        while conn.is_handshaking() {
            conn.complete_io(&mut tcp)?;
        }
        if conn.wants_write() {
            conn.complete_io(&mut tcp)?;
        }

        log_session("server", peer, &conn);
        Ok(Transport::TlsServer(Box::new(StreamOwned::new(conn, tcp))))
    }
}
