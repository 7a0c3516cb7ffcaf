//! REPL 模式（交互式 Shell）
//!
//! 专用输入线程 + crossbeam 通道：主线程同时等待用户输入和连接事件，
//! 心跳发现连接丢失时立即提示重连。

use anyhow::Result;
use crossbeam_channel::{Receiver, bounded, never, select};
use robopi_sdk::client::Discovery;
use robopi_sdk::{Command, ConnectionEvent, RobotController};
use rustyline::Editor;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use tracing::warn;

use crate::commands::discover::MdnsDiscovery;
use crate::commands::{CliConfig, ConnectArgs};

/// 输入线程在 Ctrl+C 时发送的哨兵
const INTERRUPT: &str = "\u{3}";

/// 一行输入解析后的动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Help,
    Connect(Option<String>),
    Disconnect,
    Status,
    Execute(Command),
    Picture(Option<PathBuf>),
    Discover,
    Exit,
}

/// 解析一行输入
///
/// 除了简写（`fwd`, `left`, `fl` 等）以外，也接受协议动词本身（`ROTATE_LEFT`）。
pub fn parse_line(line: &str) -> Result<ReplCommand, String> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let Some(&head) = parts.first() else {
        return Err("空命令".into());
    };
    let arg = parts.get(1).map(|s| s.to_string());

    let cmd = match head.to_ascii_lowercase().as_str() {
        "help" | "?" => ReplCommand::Help,
        "connect" => ReplCommand::Connect(arg),
        "disconnect" => ReplCommand::Disconnect,
        "status" => ReplCommand::Status,
        "picture" | "pic" => ReplCommand::Picture(arg.map(PathBuf::from)),
        "discover" => ReplCommand::Discover,
        "exit" | "quit" => ReplCommand::Exit,
        "fwd" | "forward" => ReplCommand::Execute(Command::Forward),
        "bkwd" | "back" | "backward" => ReplCommand::Execute(Command::Backward),
        "left" => ReplCommand::Execute(Command::RotateLeft),
        "right" => ReplCommand::Execute(Command::RotateRight),
        "fl" => ReplCommand::Execute(Command::FrontLeft),
        "fr" => ReplCommand::Execute(Command::FrontRight),
        "bl" => ReplCommand::Execute(Command::BackLeft),
        "br" => ReplCommand::Execute(Command::BackRight),
        "stop" => ReplCommand::Execute(Command::Stop),
        "ping" => ReplCommand::Execute(Command::Ping),
        _ => match Command::from_verb(&head.to_ascii_uppercase()) {
            Some(Command::Connect) => ReplCommand::Connect(arg),
            Some(Command::Disconnect) => ReplCommand::Disconnect,
            Some(cmd) => ReplCommand::Execute(cmd),
            None => return Err(format!("未知命令: {head}（输入 help 查看帮助）")),
        },
    };
    Ok(cmd)
}

fn print_help() {
    println!("命令:");
    println!("  connect [host]      连接（默认使用上次的主机）");
    println!("  disconnect          断开");
    println!("  status              连接与运动状态");
    println!("  fwd | bkwd          前进 / 后退");
    println!("  left | right        原地左转 / 右转");
    println!("  fl | fr | bl | br   斜向运动");
    println!("  stop                停止");
    println!("  ping                连通性检查");
    println!("  picture [path]      拍照并保存");
    println!("  discover            mDNS 搜索设备");
    println!("  exit                退出");
    println!("Ctrl+C 立即停止运动");
}

/// REPL 会话（保持机器人连接）
pub struct ReplSession {
    config: CliConfig,
    args: ConnectArgs,
    robot: Option<RobotController>,
}

impl ReplSession {
    /// 创建新会话
    pub fn new(config: CliConfig, args: ConnectArgs) -> Self {
        Self {
            config,
            args,
            robot: None,
        }
    }

    /// 当前控制器的事件接收端（未创建控制器时永不就绪）
    fn events(&self) -> Receiver<ConnectionEvent> {
        match &self.robot {
            Some(robot) => robot.events(),
            None => never(),
        }
    }

    fn robot(&self) -> Result<&RobotController> {
        match &self.robot {
            Some(robot) if robot.is_connected() => Ok(robot),
            _ => anyhow::bail!("未连接，请先使用 connect 命令"),
        }
    }

    /// 连接到机器人
    pub fn connect(&mut self, host: Option<String>) -> Result<()> {
        if let Some(robot) = &self.robot
            && robot.is_connected()
        {
            println!("⚠️  已经连接到 {:?}", robot.remote_host());
            return Ok(());
        }

        if host.is_some() {
            self.args.host = host;
        }
        let host = self.args.host(&self.config)?;

        // 控制器在会话内复用，事件接收端保持不变
        let robot = match self.robot.take() {
            Some(robot) => robot,
            None => self.args.builder(&self.config)?.build(),
        };
        let robot = self.robot.insert(robot);

        println!("⏳ 连接到 {} ...", host);
        robot.connect(&host)?;
        println!("✅ 已连接");

        self.config.host = Some(host);
        if let Err(e) = self.config.save() {
            warn!("Failed to remember host: {}", e);
        }
        Ok(())
    }

    /// 断开连接
    pub fn disconnect(&mut self) -> Result<()> {
        let Some(robot) = self.robot.as_mut().filter(|r| r.is_connected()) else {
            println!("⚠️  未连接");
            return Ok(());
        };

        println!("⏳ 断开连接...");
        robot.disconnect()?;
        println!("✅ 已断开");
        Ok(())
    }

    fn status(&self) {
        match &self.robot {
            Some(robot) => println!(
                "{:?} host={:?} moving={}",
                robot.state(),
                robot.remote_host(),
                robot.is_moving()
            ),
            None => println!("Disconnected"),
        }
    }

    fn execute(&self, cmd: Command) -> Result<()> {
        self.robot()?.execute(cmd)?;
        println!("✅ {}", cmd.confirmation());
        Ok(())
    }

    fn picture(&self, path: Option<PathBuf>) -> Result<()> {
        let robot = self.robot()?;
        println!("⏳ 拍照...");
        let picture = robot.take_picture()?;
        let path = path.unwrap_or_else(|| picture.file_name().into());
        picture.save(&path)?;
        println!(
            "✅ {}x{} -> {}",
            picture.width(),
            picture.height(),
            path.display()
        );
        Ok(())
    }

    fn discover(&self) -> Result<()> {
        let hosts = MdnsDiscovery::new().discover(Duration::from_secs(3))?;
        if hosts.is_empty() {
            println!("未发现设备");
        }
        for host in hosts {
            println!("{}", host);
        }
        Ok(())
    }

    /// Ctrl+C：运动中则立即停止
    fn interrupt(&self) {
        if let Some(robot) = &self.robot
            && robot.is_connected()
        {
            match robot.stop_if_moving() {
                Ok(true) => println!("🛑 已停止"),
                Ok(false) => {},
                Err(e) => eprintln!("❌ 停止失败: {}", e),
            }
        }
    }

    /// 执行一条命令，返回 `false` 表示退出
    pub fn handle(&mut self, cmd: ReplCommand) -> Result<bool> {
        match cmd {
            ReplCommand::Help => print_help(),
            ReplCommand::Connect(host) => self.connect(host)?,
            ReplCommand::Disconnect => self.disconnect()?,
            ReplCommand::Status => self.status(),
            ReplCommand::Execute(cmd) => self.execute(cmd)?,
            ReplCommand::Picture(path) => self.picture(path)?,
            ReplCommand::Discover => self.discover()?,
            ReplCommand::Exit => return Ok(false),
        }
        Ok(true)
    }
}

/// REPL 输入（专用输入线程）
pub struct ReplInput {
    command_rx: Receiver<String>,
    _input_thread: thread::JoinHandle<Result<()>>,
}

impl ReplInput {
    /// 创建专用输入线程（保留历史记录）
    pub fn new() -> Self {
        let (command_tx, command_rx) = bounded::<String>(10);

        let input_thread = thread::spawn(move || {
            use rustyline::history::DefaultHistory;

            let mut rl = Editor::<(), DefaultHistory>::new()
                .map_err(|e| anyhow::anyhow!("Failed to initialize readline: {}", e))?;

            let history_path = ".robopi_history";
            rl.load_history(history_path).ok();

            println!("RoboPi CLI v{} - 交互式 Shell", env!("CARGO_PKG_VERSION"));
            println!("输入 'help' 查看帮助，'exit' 退出");
            println!();

            loop {
                match rl.readline("robopi> ") {
                    Ok(line) => {
                        let line = line.trim().to_string();
                        if line.is_empty() {
                            continue;
                        }

                        let _ = rl.add_history_entry(line.clone());
                        let exit = matches!(parse_line(&line), Ok(ReplCommand::Exit));
                        if command_tx.send(line).is_err() || exit {
                            break;
                        }
                    },

                    Err(rustyline::error::ReadlineError::Interrupted) => {
                        println!("^C");
                        let _ = command_tx.send(INTERRUPT.to_string());
                    },

                    Err(rustyline::error::ReadlineError::Eof) => {
                        let _ = command_tx.send("exit".to_string());
                        break;
                    },

                    Err(err) => {
                        eprintln!("Error: {:?}", err);
                        break;
                    },
                }
            }

            rl.save_history(history_path).ok();
            Ok(())
        });

        Self {
            command_rx,
            _input_thread: input_thread,
        }
    }
}

/// 运行 REPL 模式
pub fn run_repl(args: ConnectArgs) -> Result<()> {
    let mut session = ReplSession::new(CliConfig::load()?, args);
    let input = ReplInput::new();

    loop {
        let events = session.events();
        select! {
            recv(input.command_rx) -> line => {
                let Ok(line) = line else {
                    break;
                };
                if line == INTERRUPT {
                    session.interrupt();
                    continue;
                }
                match parse_line(&line) {
                    Ok(cmd) => match session.handle(cmd) {
                        Ok(true) => {},
                        Ok(false) => break,
                        Err(e) => eprintln!("❌ {}", e),
                    },
                    Err(msg) => eprintln!("❌ {}", msg),
                }
            },
            recv(events) -> event => {
                if let Ok(ConnectionEvent::Lost { host, reason }) = event {
                    eprintln!();
                    eprintln!("⚠️  与 {} 的连接已丢失: {}", host.as_deref().unwrap_or("?"), reason);
                    eprintln!("   使用 'connect' 重新连接");
                }
            },
        }
    }

    session.disconnect()?;
    println!("👋 再见");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_shortcuts() {
        assert_eq!(
            parse_line("fwd"),
            Ok(ReplCommand::Execute(Command::Forward))
        );
        assert_eq!(
            parse_line("  LEFT "),
            Ok(ReplCommand::Execute(Command::RotateLeft))
        );
        assert_eq!(parse_line("br"), Ok(ReplCommand::Execute(Command::BackRight)));
        assert_eq!(parse_line("quit"), Ok(ReplCommand::Exit));
    }

    #[test]
    fn test_parse_protocol_verbs() {
        assert_eq!(
            parse_line("ROTATE_RIGHT"),
            Ok(ReplCommand::Execute(Command::RotateRight))
        );
        assert_eq!(parse_line("front_left"), Ok(ReplCommand::Execute(Command::FrontLeft)));
        assert_eq!(parse_line("CONN"), Ok(ReplCommand::Connect(None)));
        assert_eq!(parse_line("DISCONN"), Ok(ReplCommand::Disconnect));
    }

    #[test]
    fn test_parse_arguments() {
        assert_eq!(
            parse_line("connect 192.168.1.42"),
            Ok(ReplCommand::Connect(Some("192.168.1.42".into())))
        );
        assert_eq!(
            parse_line("picture /tmp/shot.png"),
            Ok(ReplCommand::Picture(Some(PathBuf::from("/tmp/shot.png"))))
        );
        assert_eq!(parse_line("picture"), Ok(ReplCommand::Picture(None)));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_line("").is_err());
        assert!(parse_line("jump").is_err());
    }

    #[test]
    fn test_commands_require_connection() {
        let mut session = ReplSession::new(CliConfig::default(), ConnectArgs::default());
        assert!(session.handle(ReplCommand::Execute(Command::Forward)).is_err());
        assert!(session.handle(ReplCommand::Picture(None)).is_err());
        assert!(session.handle(ReplCommand::Disconnect).unwrap());
        assert!(!session.handle(ReplCommand::Exit).unwrap());
    }

    #[test]
    fn test_connect_without_host() {
        let mut session = ReplSession::new(CliConfig::default(), ConnectArgs::default());
        assert!(session.connect(None).is_err());
        assert!(session.robot.is_none());
    }
}
