//! One-shot 模式
//!
//! 每个命令独立执行：
//! 1. 读取配置
//! 2. 连接机器人
//! 3. 执行操作
//! 4. 断开连接

use anyhow::Result;
use robopi_sdk::RobotController;
use std::thread;
use tracing::{info, warn};

use crate::commands::{CliConfig, ConnectArgs, DriveCommand, PictureCommand};

/// One-shot 模式
pub struct OneShotMode {
    config: CliConfig,
}

impl OneShotMode {
    /// 创建新的 One-shot 模式实例
    pub fn new() -> Result<Self> {
        Ok(Self {
            config: CliConfig::load()?,
        })
    }

    /// 连接并记住主机
    fn connect(&mut self, args: &ConnectArgs) -> Result<RobotController> {
        let host = args.host(&self.config)?;
        let mut robot = args.builder(&self.config)?.build();

        println!("⏳ 连接到 {} ...", host);
        robot.connect(&host)?;
        println!("✅ 已连接");

        if self.config.host.as_deref() != Some(host.as_str()) {
            self.config.host = Some(host);
            if let Err(e) = self.config.save() {
                warn!("Failed to remember host: {}", e);
            }
        }
        Ok(robot)
    }

    fn finish(mut robot: RobotController, result: Result<()>) -> Result<()> {
        if result.is_err() {
            // 出错时尽量让机器人停下
            if let Err(e) = robot.stop_if_moving() {
                warn!("Failed to stop robot: {}", e);
            }
        }
        let disconnected = robot.disconnect();
        result?;
        disconnected?;
        println!("✅ 已断开");
        Ok(())
    }

    /// 连通性检查
    pub fn ping(&mut self, args: &ConnectArgs) -> Result<()> {
        let robot = self.connect(args)?;
        let result = robot.ping().map_err(Into::into);
        if result.is_ok() {
            println!("PING_OK");
        }
        Self::finish(robot, result)
    }

    /// 执行命令序列
    pub fn drive(&mut self, cmd: &DriveCommand) -> Result<()> {
        let commands = cmd.parse_commands()?;
        let robot = self.connect(&cmd.connect)?;

        let result = (|| -> Result<()> {
            for (i, command) in commands.iter().enumerate() {
                if i > 0 {
                    thread::sleep(cmd.hold());
                }
                robot.execute(*command)?;
                info!("{} confirmed", command);
                println!("✅ {}", command.confirmation());
            }
            // 序列结束时不让机器人继续运动
            if robot.stop_if_moving()? {
                println!("✅ STOP_OK");
            }
            Ok(())
        })();

        Self::finish(robot, result)
    }

    /// 拍照并保存
    pub fn picture(&mut self, cmd: &PictureCommand) -> Result<()> {
        let robot = self.connect(&cmd.connect)?;

        let result = (|| -> Result<()> {
            println!("⏳ 拍照...");
            let picture = robot.take_picture()?;
            let path = cmd
                .output
                .clone()
                .unwrap_or_else(|| picture.file_name().into());
            picture.save(&path)?;
            println!(
                "✅ {}x{} {:?} -> {}",
                picture.width(),
                picture.height(),
                picture.format(),
                path.display()
            );
            Ok(())
        })();

        Self::finish(robot, result)
    }
}
