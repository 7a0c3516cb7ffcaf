//! 集成测试公共工具：进程内设备与桩设备

#![allow(dead_code)]

use robopi_sdk::prelude::*;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

pub const HOST: &str = "127.0.0.1";

/// 在回环地址的随机端口上启动设备
pub fn spawn_device(config: DeviceConfig) -> DeviceHandle {
    Device::bind(config).unwrap().spawn().unwrap()
}

pub fn faithful_device() -> DeviceHandle {
    spawn_device(small_picture(DeviceConfig::ephemeral()))
}

pub fn faulty_device() -> DeviceHandle {
    spawn_device(small_picture(
        DeviceConfig::ephemeral().with_mode(FidelityMode::Faulty),
    ))
}

/// 小尺寸测试图案，缩短传输时间
pub fn small_picture(config: DeviceConfig) -> DeviceConfig {
    DeviceConfig {
        picture: PictureSource::TestPattern {
            width: 64,
            height: 48,
        },
        ..config
    }
}

/// 指向给定设备的控制器 Builder
pub fn builder_for(device: &DeviceHandle) -> ControllerBuilder {
    ControllerBuilder::new()
        .control_port(device.control_addr().port())
        .picture_port(device.picture_addr().port())
        .connect_timeout(Some(Duration::from_secs(2)))
        .keepalive_interval(Duration::from_secs(30))
        .picture_config(PictureConfig {
            settle_timeout: Duration::from_millis(200),
            max_resends: 3,
            ..PictureConfig::default()
        })
}

/// 桩设备：接受一个连接，对每一行调用 `reply`（返回 `None` 表示关闭连接），
/// 结束后返回收到的所有行
pub fn stub_device<F>(mut reply: F) -> (u16, thread::JoinHandle<Vec<String>>)
where
    F: FnMut(&str) -> Option<String> + Send + 'static,
{
    let listener = TcpListener::bind((HOST, 0)).unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = thread::spawn(move || {
        let (sock, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(sock.try_clone().unwrap());
        let mut writer: &TcpStream = &sock;
        let mut received = Vec::new();
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).unwrap_or(0) == 0 {
                break;
            }
            let line = line.trim_end().to_string();
            let answer = reply(&line);
            received.push(line);
            match answer {
                Some(answer) => {
                    if writer.write_all(format!("{answer}\n").as_bytes()).is_err() {
                        break;
                    }
                },
                None => break,
            }
        }
        received
    });
    (port, handle)
}
