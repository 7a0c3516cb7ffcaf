//! # RoboPi Device
//!
//! 设备侧协议实现：控制通道会话分发 + 图片通道服务。
//!
//! 两个监听线程彼此独立，各自一次服务一个客户端。停止是协作式的：
//! 清除运行标志，监听线程在下一次轮询时退出，正在服务的客户端 socket 被直接关闭。
//!
//! # 示例
//!
//! ```no_run
//! use robopi_device::{Device, DeviceConfig, FidelityMode};
//!
//! let config = DeviceConfig::default().with_mode(FidelityMode::Faithful);
//! let handle = Device::bind(config).unwrap().spawn().unwrap();
//! println!("control on {}", handle.control_addr());
//! handle.join().unwrap();
//! ```

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod picture;
pub mod responder;
mod shared;

pub use config::{DeviceConfig, FidelityMode, PictureSource};
pub use error::DeviceError;
pub use responder::{Directive, Response, respond};

use shared::DeviceShared;
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{error, info};

/// 已绑定端口、尚未开始服务的设备
#[derive(Debug)]
pub struct Device {
    config: DeviceConfig,
    control: TcpListener,
    picture: TcpListener,
    frame: Arc<Vec<u8>>,
}

impl Device {
    /// 加载图片源并绑定两个监听端口
    pub fn bind(config: DeviceConfig) -> Result<Self, DeviceError> {
        let frame = Arc::new(config.picture.load()?);
        let control = bind_listener(&config, config.control_port)?;
        let picture = bind_listener(&config, config.picture_port)?;

        Ok(Self {
            config,
            control,
            picture,
            frame,
        })
    }

    pub fn control_addr(&self) -> Result<SocketAddr, DeviceError> {
        Ok(self.control.local_addr()?)
    }

    pub fn picture_addr(&self) -> Result<SocketAddr, DeviceError> {
        Ok(self.picture.local_addr()?)
    }

    /// 在后台线程中开始服务
    pub fn spawn(self) -> Result<DeviceHandle, DeviceError> {
        let control_addr = self.control_addr()?;
        let picture_addr = self.picture_addr()?;
        let shared = Arc::new(DeviceShared::new());
        let config = Arc::new(self.config);

        info!(
            "Device starting ({:?}, tls: {}): control {}, picture {}",
            config.mode,
            config.tls.is_some(),
            control_addr,
            picture_addr
        );

        let control_thread = {
            let shared = shared.clone();
            let config = config.clone();
            let listener = self.control;
            thread::Builder::new()
                .name("robopi-control".to_string())
                .spawn(move || {
                    let result = dispatcher::accept_loop(
                        "control",
                        listener,
                        &shared,
                        config.poll_interval,
                        |tcp, peer| dispatcher::serve_control_client(tcp, peer, &shared, &config),
                    );
                    finish("control", &shared, result);
                })
                .map_err(|e| DeviceError::Thread(e.to_string()))?
        };

        let picture_thread = {
            let shared = shared.clone();
            let config = config.clone();
            let frame = self.frame;
            let listener = self.picture;
            thread::Builder::new()
                .name("robopi-picture".to_string())
                .spawn(move || {
                    let result = dispatcher::accept_loop(
                        "picture",
                        listener,
                        &shared,
                        config.poll_interval,
                        |tcp, peer| {
                            picture::serve_picture_client(tcp, peer, &shared, &config, &frame)
                        },
                    );
                    finish("picture", &shared, result);
                })
        };
        let picture_thread = match picture_thread {
            Ok(handle) => handle,
            Err(e) => {
                shared.stop();
                let _ = control_thread.join();
                return Err(DeviceError::Thread(e.to_string()));
            },
        };

        Ok(DeviceHandle {
            control_addr,
            picture_addr,
            shared,
            threads: vec![control_thread, picture_thread],
        })
    }

    /// 在当前线程阻塞服务，直到设备停止
    pub fn run(self) -> Result<(), DeviceError> {
        self.spawn()?.join()
    }
}

fn bind_listener(config: &DeviceConfig, port: u16) -> Result<TcpListener, DeviceError> {
    TcpListener::bind((config.bind_addr, port)).map_err(|source| DeviceError::Bind {
        addr: format!("{}:{}", config.bind_addr, port),
        source,
    })
}

/// 监听线程退出时的收尾：任何一个线程出错都停止整个设备
fn finish(name: &str, shared: &DeviceShared, result: Result<(), DeviceError>) {
    if let Err(e) = result {
        error!("{} listener failed: {}", name, e);
        shared.stop();
    }
}

/// 运行中设备的句柄
///
/// 丢弃时停止设备并等待监听线程退出。
#[derive(Debug)]
pub struct DeviceHandle {
    control_addr: SocketAddr,
    picture_addr: SocketAddr,
    shared: Arc<DeviceShared>,
    threads: Vec<JoinHandle<()>>,
}

impl DeviceHandle {
    pub fn control_addr(&self) -> SocketAddr {
        self.control_addr
    }

    pub fn picture_addr(&self) -> SocketAddr {
        self.picture_addr
    }

    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    /// 请求停止（不等待）
    pub fn shutdown(&self) {
        self.shared.stop();
    }

    /// 可跨线程传递的停止句柄（用于信号处理）
    pub fn stopper(&self) -> DeviceStopper {
        DeviceStopper {
            shared: self.shared.clone(),
        }
    }

    /// 等待设备停止（由 `shutdown`、停止句柄或测试夹具退出触发）
    pub fn join(mut self) -> Result<(), DeviceError> {
        self.join_threads()
    }

    fn join_threads(&mut self) -> Result<(), DeviceError> {
        let mut panicked = Vec::new();
        for handle in self.threads.drain(..) {
            let name = handle.thread().name().unwrap_or("device").to_string();
            if handle.join().is_err() {
                panicked.push(name);
            }
        }
        if panicked.is_empty() {
            Ok(())
        } else {
            Err(DeviceError::Thread(format!(
                "thread(s) panicked: {}",
                panicked.join(", ")
            )))
        }
    }
}

impl Drop for DeviceHandle {
    fn drop(&mut self) {
        self.shared.stop();
        if let Err(e) = self.join_threads() {
            error!("{}", e);
        }
    }
}

/// 停止句柄
#[derive(Debug, Clone)]
pub struct DeviceStopper {
    shared: Arc<DeviceShared>,
}

impl DeviceStopper {
    pub fn stop(&self) {
        self.shared.stop();
    }

    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }
}
