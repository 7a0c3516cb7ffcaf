//! 图片通道服务
//!
//! 与控制通道并行的独立监听线程，一次服务一个客户端：
//!
//! - 第一行必须是 `PICTURE`，否则回复 `PICTURE_ERR`
//! - 当前没有控制会话：`PICTURE_ERR`
//! - faulty：`PICTURE_KO`
//! - faithful：`PICTURE_OK` 后发送整帧，然后读客户端回复；
//!   `RESEND_PICTURE` 重发（有上限），`RECEIVED_OK` 结束

use crate::config::{DeviceConfig, FidelityMode};
use crate::dispatcher::open_client;
use crate::error::DeviceError;
use crate::shared::{DeviceShared, Lane};
use robopi_net::{LineStream, NetError};
use robopi_protocol::{PICTURE, PICTURE_ERR, PICTURE_KO, PICTURE_OK, RECEIVED_OK, RESEND_PICTURE};
use std::net::{SocketAddr, TcpStream};
use tracing::{debug, info, warn};

/// 帧头、帧尾保留不动的字节数（覆盖 PNG 签名和 `IEND` 块）
const CORRUPT_KEEP_HEAD: usize = 8;
const CORRUPT_KEEP_TAIL: usize = 12;

/// 破坏帧内容但保留帧边界
pub fn corrupt_frame(frame: &[u8]) -> Vec<u8> {
    let mut bad = frame.to_vec();
    let end = bad.len().saturating_sub(CORRUPT_KEEP_TAIL);
    if end > CORRUPT_KEEP_HEAD {
        for b in &mut bad[CORRUPT_KEEP_HEAD..end] {
            *b ^= 0xA5;
        }
    }
    bad
}

/// 按块大小补零
pub fn pad_frame(frame: &mut Vec<u8>, block: usize) {
    if block == 0 {
        return;
    }
    let rem = frame.len() % block;
    if rem != 0 {
        frame.resize(frame.len() + block - rem, 0);
    }
}

/// 服务一个图片通道客户端
pub(crate) fn serve_picture_client(
    tcp: TcpStream,
    peer: SocketAddr,
    shared: &DeviceShared,
    config: &DeviceConfig,
    frame: &[u8],
) {
    let result = open_client(tcp, config.tls.as_ref()).and_then(|mut stream| {
        let result = run_picture_session(&mut stream, shared, config, frame);
        stream.close();
        result
    });
    shared.unregister(Lane::Picture);

    if let Err(e) = result {
        warn!("[pic] Session with {} ended: {}", peer, e);
    }
}

fn run_picture_session(
    stream: &mut LineStream,
    shared: &DeviceShared,
    config: &DeviceConfig,
    frame: &[u8],
) -> Result<(), DeviceError> {
    if !shared.register(Lane::Picture, stream.shutdown_handle().ok()) {
        return Ok(());
    }

    let request = match stream.read_line() {
        Ok(line) => line,
        Err(NetError::Closed) => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    if request != PICTURE {
        warn!("[pic] Invalid command: {:?}", request);
        stream.write_line(PICTURE_ERR)?;
        return Ok(());
    }
    if !shared.is_control_active() {
        warn!("[pic] Picture requested without a control session");
        stream.write_line(PICTURE_ERR)?;
        return Ok(());
    }
    if config.mode == FidelityMode::Faulty {
        stream.write_line(PICTURE_KO)?;
        return Ok(());
    }

    stream.write_line(PICTURE_OK)?;

    let mut transmissions = 0;
    loop {
        let mut payload = if transmissions < config.corrupt_transmissions {
            corrupt_frame(frame)
        } else {
            frame.to_vec()
        };
        if let Some(block) = config.pad_to_block {
            pad_frame(&mut payload, block);
        }
        stream.write_raw(&payload)?;
        transmissions += 1;
        debug!("[pic] Sent {} picture bytes (transmission {})", payload.len(), transmissions);

        match stream.read_line() {
            Ok(reply) if reply == RESEND_PICTURE => {
                if transmissions > config.max_resends_served {
                    warn!(
                        "[pic] Resend limit reached ({}), closing",
                        config.max_resends_served
                    );
                    return Ok(());
                }
            },
            Ok(reply) if reply == RECEIVED_OK => {
                info!("[pic] Client {} received the picture", stream.peer());
                return Ok(());
            },
            Ok(reply) => {
                warn!("[pic] Invalid client response: {:?}", reply);
                return Ok(());
            },
            Err(NetError::Closed) => {
                debug!("[pic] Client closed before acknowledging");
                return Ok(());
            },
            Err(e) => return Err(e.into()),
        }
    }
}
