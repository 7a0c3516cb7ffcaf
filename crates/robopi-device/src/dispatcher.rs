//! 控制通道会话分发
//!
//! 一次只服务一个客户端。每个客户端的会话状态：`Greeting → Serving → Closed`。
//!
//! - Greeting：读第一行（内容不限），标记控制会话已建立，回复 `CONN_OK`
//! - Serving：逐行按 [`respond`] 的规则应答
//! - Closed：`DISCONN`、EOF 或 I/O 错误

use crate::config::DeviceConfig;
use crate::error::DeviceError;
use crate::responder::{Directive, respond};
use crate::shared::{DeviceShared, Lane};
use robopi_net::{LineStream, NetError, TlsServerSettings, Transport};
use robopi_protocol::Command;
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// TLS 握手的读超时
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// 轮询 accept，直到设备停止
///
/// 监听 socket 设为非阻塞，每轮检查一次运行标志。
pub(crate) fn accept_loop<F>(
    name: &str,
    listener: TcpListener,
    shared: &DeviceShared,
    poll_interval: Duration,
    mut serve: F,
) -> Result<(), DeviceError>
where
    F: FnMut(TcpStream, SocketAddr),
{
    listener.set_nonblocking(true)?;
    info!("{} listener ready on {}", name, listener.local_addr()?);

    while shared.is_running() {
        match listener.accept() {
            Ok((tcp, peer)) => {
                debug!("{}: client {} connected", name, peer);
                // 部分平台上 accept 得到的 socket 会继承非阻塞标志
                tcp.set_nonblocking(false)?;
                serve(tcp, peer);
                debug!("{}: client {} done", name, peer);
            },
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => thread::sleep(poll_interval),
            Err(e) => {
                warn!("{}: accept failed: {}", name, e);
                thread::sleep(poll_interval);
            },
        }
    }

    info!("{} listener stopped", name);
    Ok(())
}

/// 把接受的 TCP 连接包装成按行流（按需完成 TLS 握手）
pub(crate) fn open_client(
    tcp: TcpStream,
    tls: Option<&TlsServerSettings>,
) -> Result<LineStream, DeviceError> {
    let transport = match tls {
        Some(tls) => {
            tcp.set_read_timeout(Some(HANDSHAKE_TIMEOUT))?;
            let transport = tls.accept(tcp)?;
            transport.set_read_timeout(None)?;
            transport
        },
        None => Transport::Plain(tcp),
    };
    Ok(LineStream::new(transport)?)
}

/// 服务一个控制通道客户端
pub(crate) fn serve_control_client(
    tcp: TcpStream,
    peer: SocketAddr,
    shared: &DeviceShared,
    config: &DeviceConfig,
) {
    let result = open_client(tcp, config.tls.as_ref())
        .and_then(|mut stream| {
            let result = run_session(&mut stream, shared, config);
            stream.close();
            result
        });

    shared.set_control_active(false);
    shared.unregister(Lane::Control);

    match result {
        Ok(()) => info!("Control session with {} closed", peer),
        Err(e) => warn!("Control session with {} ended: {}", peer, e),
    }
}

fn run_session(
    stream: &mut LineStream,
    shared: &DeviceShared,
    config: &DeviceConfig,
) -> Result<(), DeviceError> {
    if !shared.register(Lane::Control, stream.shutdown_handle().ok()) {
        return Ok(());
    }

    // Greeting
    let greeting = match stream.read_line() {
        Ok(line) => line,
        Err(NetError::Closed) => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    trace!("Greeting from {}: {:?}", stream.peer(), greeting);
    shared.set_control_active(true);
    stream.write_line(Command::Connect.confirmation())?;
    info!("Control session established with {}", stream.peer());

    // Serving
    loop {
        let line = match stream.read_line() {
            Ok(line) => line,
            Err(NetError::Closed) => {
                debug!("{} closed the control channel", stream.peer());
                return Ok(());
            },
            Err(e) => return Err(e.into()),
        };

        let response = respond(&line, config.mode, config.harness_exit);
        debug!("{:?} -> {:?}", line, response.reply);
        stream.write_line(&response.reply)?;

        match response.directive {
            Directive::Continue => {},
            Directive::CloseSession => return Ok(()),
            Directive::StopDevice => {
                info!("Harness exit requested by {:?}", line);
                shared.stop();
                return Ok(());
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FidelityMode;
    use std::io::{BufRead, BufReader, Write};
    use std::sync::Arc;

    struct TestClient {
        reader: BufReader<TcpStream>,
        writer: TcpStream,
    }

    impl TestClient {
        fn connect(addr: SocketAddr) -> Self {
            let writer = TcpStream::connect(addr).unwrap();
            let reader = BufReader::new(writer.try_clone().unwrap());
            Self { reader, writer }
        }

        fn send(&mut self, line: &str) -> String {
            self.writer.write_all(format!("{line}\n").as_bytes()).unwrap();
            let mut reply = String::new();
            self.reader.read_line(&mut reply).unwrap();
            reply.trim_end().to_string()
        }

        fn at_eof(&mut self) -> bool {
            let mut rest = String::new();
            self.reader.read_line(&mut rest).unwrap_or(0) == 0
        }
    }

    fn spawn_control(
        config: DeviceConfig,
    ) -> (SocketAddr, Arc<DeviceShared>, thread::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let shared = Arc::new(DeviceShared::new());
        let thread_shared = shared.clone();
        let handle = thread::spawn(move || {
            accept_loop(
                "control",
                listener,
                &thread_shared,
                Duration::from_millis(5),
                |tcp, peer| serve_control_client(tcp, peer, &thread_shared, &config),
            )
            .unwrap();
        });
        (addr, shared, handle)
    }

    #[test]
    fn test_session_faithful() {
        let (addr, shared, handle) = spawn_control(DeviceConfig::ephemeral());
        let mut client = TestClient::connect(addr);

        assert_eq!(client.send("HELLO"), "CONN_OK");
        assert!(shared.is_control_active());
        assert_eq!(client.send("FWD"), "FWD_OK");
        assert_eq!(client.send("JUMP"), "CMD_ERR");
        assert_eq!(client.send("PING"), "PING");
        assert_eq!(client.send("DISCONN"), "DISCONN_OK");
        assert!(client.at_eof());

        shared.stop();
        handle.join().unwrap();
        assert!(!shared.is_control_active());
    }

    #[test]
    fn test_session_faulty() {
        let config = DeviceConfig::ephemeral().with_mode(FidelityMode::Faulty);
        let (addr, shared, handle) = spawn_control(config);
        let mut client = TestClient::connect(addr);

        assert_eq!(client.send("CONN"), "CONN_OK");
        assert_eq!(client.send("STOP"), "STOP_KO");
        assert_eq!(client.send("PING"), "PING_KO");
        assert_eq!(client.send("DISCONN"), "DISCONN_OK");

        shared.stop();
        handle.join().unwrap();
    }

    #[test]
    fn test_serves_clients_one_after_another() {
        let (addr, shared, handle) = spawn_control(DeviceConfig::ephemeral());

        for _ in 0..2 {
            let mut client = TestClient::connect(addr);
            assert_eq!(client.send("CONN"), "CONN_OK");
            assert_eq!(client.send("BKWD"), "BKWD_OK");
            drop(client);
        }

        shared.stop();
        handle.join().unwrap();
    }

    #[test]
    fn test_harness_exit_stops_device() {
        let config = DeviceConfig {
            harness_exit: true,
            ..DeviceConfig::ephemeral()
        };
        let (addr, shared, handle) = spawn_control(config);
        let mut client = TestClient::connect(addr);

        assert_eq!(client.send("CONN"), "CONN_OK");
        assert_eq!(client.send("STOP"), "STOP_OK");
        handle.join().unwrap();
        assert!(!shared.is_running());
    }

    #[test]
    fn test_stop_unblocks_idle_session() {
        let (addr, shared, handle) = spawn_control(DeviceConfig::ephemeral());
        let mut client = TestClient::connect(addr);
        assert_eq!(client.send("CONN"), "CONN_OK");

        shared.stop();
        handle.join().unwrap();
        assert!(client.at_eof());
    }
}
