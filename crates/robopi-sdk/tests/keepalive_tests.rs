//! 心跳端到端测试
//!
//! 依赖真实时间，串行执行以减少调度抖动。

mod common;

use common::*;
use robopi_sdk::prelude::*;
use serial_test::serial;
use std::thread;
use std::time::{Duration, Instant};

const INTERVAL: Duration = Duration::from_millis(100);

/// faulty 设备对 PING 回复 PING_KO：一个心跳间隔内连接被判定丢失
#[test]
#[serial]
fn test_faulty_device_is_detected_within_one_interval() {
    let device = faulty_device();
    let mut robot = builder_for(&device).keepalive_interval(INTERVAL).build();
    let events = robot.events();

    let start = Instant::now();
    robot.connect(HOST).unwrap();

    let event = events.recv_timeout(INTERVAL * 10).unwrap();
    assert!(start.elapsed() < INTERVAL * 10);
    match event {
        ConnectionEvent::Lost { host, reason } => {
            assert_eq!(host.as_deref(), Some(HOST));
            assert!(reason.contains("PING_KO"), "{reason}");
        },
    }
    assert_eq!(robot.state(), ConnectionState::Disconnected);
    assert_eq!(
        robot.forward().unwrap_err().kind(),
        CommErrorKind::CantConnect
    );
}

/// faithful 设备：多个心跳周期后连接仍然有效，且前台命令不受影响
#[test]
#[serial]
fn test_faithful_device_stays_connected() {
    let device = faithful_device();
    let mut robot = builder_for(&device).keepalive_interval(INTERVAL).build();
    let events = robot.events();
    robot.connect(HOST).unwrap();

    for _ in 0..5 {
        robot.forward().unwrap();
        thread::sleep(INTERVAL);
        robot.stop().unwrap();
    }
    assert!(robot.is_connected());
    assert!(events.try_recv().is_err());

    robot.disconnect().unwrap();
}

/// 主动断开后心跳停止，不会发布连接丢失事件
#[test]
#[serial]
fn test_disconnect_deactivates_keepalive() {
    let device = faithful_device();
    let mut robot = builder_for(&device).keepalive_interval(INTERVAL).build();
    let events = robot.events();

    robot.connect(HOST).unwrap();
    thread::sleep(INTERVAL * 2);
    robot.disconnect().unwrap();
    thread::sleep(INTERVAL * 3);

    assert!(events.try_recv().is_err());
}

/// 设备被停止：下一次心跳发现连接丢失，之后可以提示重连
#[test]
#[serial]
fn test_device_shutdown_is_reported() {
    let device = faithful_device();
    let mut robot = builder_for(&device).keepalive_interval(INTERVAL).build();
    let events = robot.events();
    robot.connect(HOST).unwrap();

    device.shutdown();
    let event = events.recv_timeout(INTERVAL * 20).unwrap();
    assert!(matches!(event, ConnectionEvent::Lost { .. }));
    assert!(!robot.is_connected());
}
