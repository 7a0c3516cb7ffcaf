//! 监听线程之间共享的运行状态

use parking_lot::Mutex;
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// 正在服务的客户端所属的通道
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Lane {
    Control,
    Picture,
}

#[derive(Debug)]
pub(crate) struct DeviceShared {
    running: AtomicBool,
    /// 控制通道当前是否有已问候的会话（图片通道据此拒绝请求）
    control_active: AtomicBool,
    control_client: Mutex<Option<TcpStream>>,
    picture_client: Mutex<Option<TcpStream>>,
}

impl DeviceShared {
    pub(crate) fn new() -> Self {
        Self {
            running: AtomicBool::new(true),
            control_active: AtomicBool::new(false),
            control_client: Mutex::new(None),
            picture_client: Mutex::new(None),
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub(crate) fn is_control_active(&self) -> bool {
        self.control_active.load(Ordering::Acquire)
    }

    pub(crate) fn set_control_active(&self, active: bool) {
        self.control_active.store(active, Ordering::Release);
    }

    fn slot(&self, lane: Lane) -> &Mutex<Option<TcpStream>> {
        match lane {
            Lane::Control => &self.control_client,
            Lane::Picture => &self.picture_client,
        }
    }

    /// 登记当前客户端的 socket 句柄，返回设备是否仍在运行
    ///
    /// 返回 `false` 时调用方应立即放弃该客户端。
    pub(crate) fn register(&self, lane: Lane, handle: Option<TcpStream>) -> bool {
        *self.slot(lane).lock() = handle;
        self.is_running()
    }

    pub(crate) fn unregister(&self, lane: Lane) {
        self.slot(lane).lock().take();
    }

    /// 停止设备：清除运行标志并关闭所有客户端 socket
    pub(crate) fn stop(&self) {
        if self.running.swap(false, Ordering::AcqRel) {
            debug!("Device stop requested");
        }
        for lane in [Lane::Control, Lane::Picture] {
            if let Some(sock) = self.slot(lane).lock().take() {
                let _ = sock.shutdown(Shutdown::Both);
            }
        }
    }
}
