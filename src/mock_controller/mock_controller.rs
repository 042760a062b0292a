//! ScopeDome mock controller.
//!
//! Serves a simulated dome card over TCP using the same framing as the
//! real card, so the hardware backend can be exercised without hardware.

use crate::{
    command::Command,
    error::{ScopeDomeError, ScopeDomeResult},
    frame::{encode_frame, read_frame},
    simulator::SimulatedCard,
};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};

struct MockControllerCmd {
    pub command: Command,
    pub payload: Vec<u8>,
    pub tx: oneshot::Sender<ScopeDomeResult<Vec<u8>>>,
}

pub async fn run_mock_controller(port: u16) -> ScopeDomeResult<()> {
    let listener = TcpListener::bind(("127.0.0.1", port)).await?;
    log::info!("Mock controller listening on port {port}.");
    serve(listener, SimulatedCard::default()).await
}

/// Accept connections one at a time and answer them from `card`.
pub async fn serve(listener: TcpListener, card: SimulatedCard) -> ScopeDomeResult<()> {
    let (tx, mut rx) = mpsc::channel::<MockControllerCmd>(100);

    tokio::spawn(async move {
        let mut card = card;
        while let Some(cmd) = rx.recv().await {
            let reply = card.exchange(cmd.command, &cmd.payload);
            let _ = cmd.tx.send(reply);
        }
    });

    loop {
        let (socket, address) = listener.accept().await?;
        log::info!("Mock controller connection from {address}.");
        if let Err(error) = handle_connection(socket, &tx).await {
            log::warn!("Mock controller connection closed: {error}");
        }
    }
}

async fn handle_connection(
    mut socket: TcpStream,
    tx: &mpsc::Sender<MockControllerCmd>,
) -> ScopeDomeResult<()> {
    loop {
        let (opcode, payload) = match read_frame(&mut socket).await {
            Ok(frame) => frame,
            // Remote closed the connection.
            Err(_) => return Ok(()),
        };

        let reply = match Command::from_byte(opcode) {
            Some(command) => {
                let (reply_tx, reply_rx) = oneshot::channel();
                tx.send(MockControllerCmd {
                    command,
                    payload,
                    tx: reply_tx,
                })
                .await
                .map_err(|_| ScopeDomeError::new("Mock controller loop stopped."))?;
                let reply = reply_rx
                    .await
                    .map_err(|_| ScopeDomeError::new("Mock controller loop dropped a reply."))?;
                match reply {
                    Ok(bytes) if bytes.is_empty() => encode_frame(Command::Ack.byte_value(), &[])?,
                    Ok(bytes) => encode_frame(opcode, &bytes)?,
                    Err(error) => {
                        log::warn!("Rejecting {command:?}: {error}");
                        encode_frame(Command::ParamError.byte_value(), &[])?
                    }
                }
            }
            None => {
                log::warn!("Unknown dome command 0x{opcode:02X}.");
                encode_frame(Command::FunctionNotSupported.byte_value(), &[])?
            }
        };

        socket.write_all(&reply).await?;
    }
}
