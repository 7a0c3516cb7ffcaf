//! 心跳监视线程
//!
//! 一个专用线程，状态机为 `Idle ⇄ Active`，外加终态 `Shutdown`：
//!
//! - Idle：在条件变量上等待 [`activate`](KeepaliveMonitor::activate) 或关闭
//! - Active：在条件变量上等待一个心跳间隔（可被打断），然后通过共享的
//!   [`CommandChannel`] 发送一次 `PING`
//! - 心跳失败：回到 Idle，并发布 [`ConnectionEvent::Lost`]
//!
//! 心跳和前台命令使用同一把交换锁，因此两者的请求/应答不会交错。

use crate::channel::CommandChannel;
use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::{Condvar, Mutex};
use robopi_protocol::DEFAULT_KEEPALIVE_INTERVAL;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, trace, warn};

/// 连接事件（由心跳线程发布，供前端提示重连）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// 心跳失败，连接已关闭
    Lost {
        host: Option<String>,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MonitorState {
    Idle,
    Active,
    Shutdown,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<MonitorState>,
    cond: Condvar,
}

impl Shared {
    fn set(&self, state: MonitorState) {
        let mut current = self.state.lock();
        // Shutdown 是终态
        if *current != MonitorState::Shutdown {
            *current = state;
        }
        self.cond.notify_all();
    }
}

/// 心跳监视器
#[derive(Debug)]
pub struct KeepaliveMonitor {
    shared: Arc<Shared>,
    interval: Duration,
    events: Receiver<ConnectionEvent>,
    handle: Option<JoinHandle<()>>,
}

impl KeepaliveMonitor {
    /// 启动监视线程（初始为 Idle）
    pub fn spawn(channel: CommandChannel, interval: Duration) -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(MonitorState::Idle),
            cond: Condvar::new(),
        });
        let (tx, rx) = unbounded();

        let thread_shared = shared.clone();
        let handle = thread::Builder::new()
            .name("robopi-keepalive".to_string())
            .spawn(move || run(thread_shared, channel, interval, tx));

        let handle = match handle {
            Ok(handle) => Some(handle),
            Err(e) => {
                error!("Failed to spawn keepalive thread: {}", e);
                None
            },
        };

        Self {
            shared,
            interval,
            events: rx,
            handle,
        }
    }

    /// 使用默认间隔启动
    pub fn with_default_interval(channel: CommandChannel) -> Self {
        Self::spawn(channel, DEFAULT_KEEPALIVE_INTERVAL)
    }

    /// 连接已建立：开始周期性心跳
    pub fn activate(&self) {
        debug!("Keepalive activated (interval {:?})", self.interval);
        self.shared.set(MonitorState::Active);
    }

    /// 主动断开：停止心跳
    pub fn deactivate(&self) {
        debug!("Keepalive deactivated");
        self.shared.set(MonitorState::Idle);
    }

    pub fn is_active(&self) -> bool {
        *self.shared.state.lock() == MonitorState::Active
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// 连接事件接收端（可克隆多份）
    pub fn events(&self) -> Receiver<ConnectionEvent> {
        self.events.clone()
    }

    /// 通知线程退出，不等待
    pub fn request_shutdown(&self) {
        let mut state = self.shared.state.lock();
        *state = MonitorState::Shutdown;
        self.shared.cond.notify_all();
    }

    /// 通知线程退出并等待其结束
    pub fn shutdown(&mut self) {
        self.request_shutdown();
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            error!("Keepalive thread panicked");
        }
    }
}

impl Drop for KeepaliveMonitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(shared: Arc<Shared>, channel: CommandChannel, interval: Duration, tx: Sender<ConnectionEvent>) {
    trace!("Keepalive thread started");

    loop {
        {
            let mut state = shared.state.lock();
            match *state {
                MonitorState::Shutdown => break,
                MonitorState::Idle => {
                    shared.cond.wait(&mut state);
                    continue;
                },
                MonitorState::Active => {
                    let deadline = Instant::now() + interval;
                    while *state == MonitorState::Active {
                        if shared.cond.wait_until(&mut state, deadline).timed_out() {
                            break;
                        }
                    }
                    if *state != MonitorState::Active {
                        continue;
                    }
                },
            }
        }

        if let Err(e) = channel.ping() {
            let mut state = shared.state.lock();
            // 期间被主动断开或关闭：不是连接丢失
            if *state != MonitorState::Active {
                debug!("Ignoring ping failure after deactivation: {}", e);
                continue;
            }
            *state = MonitorState::Idle;
            drop(state);

            warn!("Keepalive failed: {}", e);
            let event = ConnectionEvent::Lost {
                host: channel.remote_host(),
                reason: e.to_string(),
            };
            // 没有接收端时直接丢弃
            let _ = tx.send(event);
        }
    }

    trace!("Keepalive thread stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectOptions;
    use serial_test::serial;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;

    /// 桩设备：应答问候和前 `pings` 次心跳，之后返回错误令牌
    fn ping_device(pings: usize) -> (u16, thread::JoinHandle<usize>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = thread::spawn(move || {
            let (sock, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(sock.try_clone().unwrap());
            let mut seen = 0;
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).unwrap_or(0) == 0 {
                    return seen;
                }
                let reply = match line.trim_end() {
                    "CONN" => "CONN_OK".to_string(),
                    "PING" => {
                        seen += 1;
                        if seen <= pings { "PING".into() } else { "PING_KO".into() }
                    },
                    other => format!("{other}_OK"),
                };
                if (&sock).write_all(format!("{reply}\n").as_bytes()).is_err() {
                    return seen;
                }
            }
        });
        (port, handle)
    }

    fn connected_channel(port: u16) -> CommandChannel {
        let channel = CommandChannel::new();
        let options = ConnectOptions {
            control_port: port,
            ..ConnectOptions::default()
        };
        channel.connect("127.0.0.1", &options).unwrap();
        channel
    }

    #[test]
    fn test_idle_monitor_shuts_down_promptly() {
        let start = Instant::now();
        let mut monitor = KeepaliveMonitor::spawn(CommandChannel::new(), Duration::from_secs(60));
        assert!(!monitor.is_active());
        monitor.shutdown();
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_active_monitor_shuts_down_without_waiting_interval() {
        let mut monitor = KeepaliveMonitor::spawn(CommandChannel::new(), Duration::from_secs(60));
        monitor.activate();
        assert!(monitor.is_active());
        let start = Instant::now();
        monitor.shutdown();
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_shutdown_is_terminal() {
        let mut monitor = KeepaliveMonitor::spawn(CommandChannel::new(), Duration::from_secs(60));
        monitor.shutdown();
        monitor.activate();
        assert!(!monitor.is_active());
    }

    #[test]
    #[serial]
    fn test_lost_connection_is_published() {
        let (port, device) = ping_device(2);
        let channel = connected_channel(port);
        let monitor = KeepaliveMonitor::spawn(channel.clone(), Duration::from_millis(50));
        let events = monitor.events();
        monitor.activate();

        let event = events.recv_timeout(Duration::from_secs(2)).unwrap();
        match event {
            ConnectionEvent::Lost { host, reason } => {
                assert_eq!(host.as_deref(), Some("127.0.0.1"));
                assert!(reason.contains("PING_KO"), "{reason}");
            },
        }
        assert!(!channel.is_connected());
        assert!(!monitor.is_active());

        drop(monitor);
        assert_eq!(device.join().unwrap(), 3);
    }

    #[test]
    #[serial]
    fn test_deactivated_monitor_stops_pinging() {
        let (port, device) = ping_device(usize::MAX);
        let channel = connected_channel(port);
        let monitor = KeepaliveMonitor::spawn(channel.clone(), Duration::from_millis(30));
        monitor.activate();
        thread::sleep(Duration::from_millis(200));
        monitor.deactivate();
        // 等待可能正在进行的那次心跳完成
        thread::sleep(Duration::from_millis(50));

        channel.close();
        let pings = device.join().unwrap();
        assert!(pings >= 2, "only {pings} pings");
        assert!(monitor.events().try_recv().is_err());
    }
}
