//! 控制通道端到端场景
//!
//! 控制器与进程内设备（或桩设备）之间的完整会话：
//! 1. 问候握手的三种结果
//! 2. faithful / faulty 设备上的命令交换与运动状态
//! 3. 有上限的断开重试
//! 4. 并发命令不会交错

mod common;

use common::*;
use robopi_sdk::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

/// connect / forward / stop / disconnect 全部确认，停止后不再运动
#[test]
fn test_faithful_scenario() {
    let device = faithful_device();
    let mut robot = builder_for(&device).build();

    robot.connect(HOST).unwrap();
    assert!(robot.is_connected());
    assert_eq!(robot.remote_host().as_deref(), Some(HOST));

    robot.forward().unwrap();
    assert!(robot.is_moving());
    robot.stop().unwrap();
    assert!(!robot.is_moving());

    robot.disconnect().unwrap();
    assert_eq!(robot.state(), ConnectionState::Disconnected);
    assert!(device.is_running());
}

/// 所有运动命令都被确认
#[test]
fn test_every_motion_command_is_confirmed() {
    let device = faithful_device();
    let mut robot = builder_for(&device).build();
    robot.connect(HOST).unwrap();

    robot.backward().unwrap();
    robot.rotate_left().unwrap();
    robot.rotate_right().unwrap();
    robot.front_left().unwrap();
    robot.front_right().unwrap();
    robot.back_left().unwrap();
    robot.back_right().unwrap();
    assert!(robot.is_moving());
    assert!(robot.stop_if_moving().unwrap());
    assert!(!robot.stop_if_moving().unwrap());
    robot.ping().unwrap();

    robot.disconnect().unwrap();
}

/// faulty 设备：问候成功，但每个命令都得到错误令牌
#[test]
fn test_faulty_device_reports_robot_errors() {
    let device = faulty_device();
    let mut robot = builder_for(&device).build();
    robot.connect(HOST).unwrap();

    match robot.forward() {
        Err(CommError::Robot { command, reply }) => {
            assert_eq!(command, "FWD");
            assert_eq!(reply, "FWD_KO");
        },
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(!robot.is_moving());
    assert_eq!(robot.stop().unwrap_err().kind(), CommErrorKind::RobotError);

    // DISCONN 在两种模式下都会被确认
    robot.disconnect().unwrap();
    assert!(!robot.is_connected());
}

/// 设备回复 CONN_ERR
#[test]
fn test_connection_refused_by_device() {
    let (port, stub) = stub_device(|_| Some("CONN_ERR".to_string()));
    let mut robot = ControllerBuilder::new().control_port(port).build();

    let err = robot.connect(HOST).unwrap_err();
    assert_eq!(err.kind(), CommErrorKind::CantConnect);
    assert!(!robot.is_connected());
    assert_eq!(stub.join().unwrap(), vec!["CONN"]);
}

/// 对端不是 RoboPi 设备
#[test]
fn test_foreign_service_is_incorrect_device() {
    let (port, stub) = stub_device(|_| Some("220 smtp.example.com ESMTP".to_string()));
    let mut robot = ControllerBuilder::new().control_port(port).build();

    let err = robot.connect(HOST).unwrap_err();
    assert_eq!(err.kind(), CommErrorKind::IncorrectDevice);
    assert!(!robot.is_connected());
    stub.join().unwrap();
}

/// 无人监听
#[test]
fn test_nothing_listening() {
    let port = std::net::TcpListener::bind((HOST, 0))
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let mut robot = ControllerBuilder::new()
        .control_port(port)
        .connect_timeout(Some(Duration::from_millis(500)))
        .build();
    assert_eq!(
        robot.connect(HOST).unwrap_err().kind(),
        CommErrorKind::CantConnect
    );
}

/// 从不确认 DISCONN 的设备：恰好尝试 5 次，随后连接资源被释放
#[test]
fn test_disconnect_is_attempted_five_times() {
    let (port, stub) = stub_device(|line| match line {
        "CONN" => Some("CONN_OK".to_string()),
        _ => Some("BUSY".to_string()),
    });
    let mut robot = ControllerBuilder::new()
        .control_port(port)
        .keepalive_interval(Duration::from_secs(60))
        .build();
    robot.connect(HOST).unwrap();

    let err = robot.disconnect().unwrap_err();
    assert_eq!(err.kind(), CommErrorKind::RobotError);

    let received = stub.join().unwrap();
    assert_eq!(received.iter().filter(|l| *l == "DISCONN").count(), 5);
    assert_eq!(received.len(), 6);
}

/// 多个线程共享同一个命令通道：每个交换都拿到自己命令的确认
#[test]
fn test_concurrent_commands_never_interleave() {
    let device = faithful_device();
    let mut robot = builder_for(&device).build();
    robot.connect(HOST).unwrap();

    let commands = [
        Command::Forward,
        Command::Backward,
        Command::RotateLeft,
        Command::RotateRight,
        Command::Stop,
        Command::Ping,
    ];
    let ok = Arc::new(AtomicUsize::new(0));
    let workers: Vec<_> = commands
        .iter()
        .map(|&cmd| {
            let channel = robot.channel().clone();
            let ok = ok.clone();
            thread::spawn(move || {
                for _ in 0..25 {
                    channel.execute(cmd).unwrap();
                    ok.fetch_add(1, Ordering::Relaxed);
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(ok.load(Ordering::Relaxed), commands.len() * 25);
    robot.disconnect().unwrap();
}

/// 测试夹具退出：faithful 设备收到 STOP 后停止
#[test]
fn test_harness_exit_on_stop() {
    let device = spawn_device(small_picture(DeviceConfig {
        harness_exit: true,
        ..DeviceConfig::ephemeral()
    }));
    let mut robot = builder_for(&device).build();
    robot.connect(HOST).unwrap();
    robot.stop().unwrap();

    device.join().unwrap();
}

/// 断开后可以重新连接
#[test]
fn test_reconnect_after_disconnect() {
    let device = faithful_device();
    let mut robot = builder_for(&device).build();

    for _ in 0..3 {
        robot.connect(HOST).unwrap();
        robot.forward().unwrap();
        robot.stop().unwrap();
        robot.disconnect().unwrap();
        assert!(!robot.is_connected());
    }
}
