use crate::config;
use crate::protocol::{CitizenCommand, GameEvent, PrivateUpdate, ServerMessage};
use crate::state::{AppState, WorldUpdate};

use axum::{
    Error,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures::SinkExt;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, info, warn};

#[derive(Debug)]
enum NetError {
    Ws(axum::Error),
    Serialization(serde_json::Error),
    InputClosed,
    JoinDropped,
    WorldUpdatesClosed,
}

impl From<axum::Error> for NetError {
    fn from(e: axum::Error) -> Self {
        NetError::Ws(e)
    }
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    let mut ctx = match bootstrap_connection(&mut socket, &state).await {
        Ok(ctx) => ctx,
        Err(e) => {
            error!(error = ?e, "failed to bootstrap connection");
            return;
        }
    };

    if let Err(e) = run_client_loop(&mut socket, &mut ctx).await {
        warn!(sid = ctx.sid, error = ?e, "client loop ended with error");
    }
}

async fn send_message(socket: &mut WebSocket, msg: &ServerMessage) -> Result<(), NetError> {
    let txt = serde_json::to_string(msg).map_err(NetError::Serialization)?;
    socket
        .send(Message::Text(txt.into()))
        .await
        .map_err(NetError::Ws)
}

struct ConnCtx {
    pub sid: u64,
    pub input_tx: mpsc::Sender<GameEvent>,
    pub world_rx: broadcast::Receiver<WorldUpdate>,
    pub private_rx: mpsc::Receiver<PrivateUpdate>,
}

async fn bootstrap_connection(
    socket: &mut WebSocket,
    state: &AppState,
) -> Result<ConnCtx, NetError> {
    // Subscribe before any await so no broadcast lands in the gap
    // between the snapshot and the first forwarded update.
    let world_rx = state.world_tx.subscribe();

    let (private_tx, private_rx) = mpsc::channel(config::PRIVATE_CHANNEL_CAPACITY);
    let (reply_tx, reply_rx) = oneshot::channel();
    state
        .input_tx
        .send(GameEvent::Join {
            reply: reply_tx,
            private_tx,
        })
        .await
        .map_err(|_| NetError::InputClosed)?;
    let ack = reply_rx.await.map_err(|_| NetError::JoinDropped)?;

    send_message(socket, &ServerMessage::Welcome { sid: ack.sid }).await?;
    // The snapshot was taken after the spawn, so it already includes
    // this peer's own citizen.
    if let Err(e) = send_message(
        socket,
        &ServerMessage::Snapshot {
            entities: ack.snapshot,
        },
    )
    .await
    {
        // Spawned but never fully connected; compensate with a Leave.
        state
            .input_tx
            .send(GameEvent::Leave { sid: ack.sid })
            .await
            .map_err(|_| NetError::InputClosed)?;
        return Err(e);
    }

    info!(sid = ack.sid, "peer joined");
    Ok(ConnCtx {
        sid: ack.sid,
        input_tx: state.input_tx.clone(),
        world_rx,
        private_rx,
    })
}

enum LoopControl {
    Continue,
    Disconnect,
}

async fn run_client_loop(socket: &mut WebSocket, ctx: &mut ConnCtx) -> Result<(), NetError> {
    let sid = ctx.sid;
    let input_tx = &ctx.input_tx;
    let world_rx = &mut ctx.world_rx;
    let private_rx = &mut ctx.private_rx;

    let mut fatal: Option<NetError> = None;

    loop {
        let disconnect: bool = tokio::select! {
            incoming = socket.recv() => {
                match handle_incoming_ws(incoming, sid, input_tx) {
                    Ok(LoopControl::Continue) => false,
                    Ok(LoopControl::Disconnect) => true,
                    Err(e) => {
                        fatal = Some(e);
                        true
                    }
                }
            }

            world_msg = world_rx.recv() => {
                match world_msg {
                    Ok(update) => {
                        let msg = ServerMessage::Update { entities: update.entities };
                        match send_message(socket, &msg).await {
                            Ok(()) => false,
                            Err(_) => true,
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        // Deltas are cumulative per property, so a
                        // skipped batch self-heals on the next change.
                        warn!(sid, missed = n, "world updates lagged");
                        false
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        fatal = Some(NetError::WorldUpdatesClosed);
                        true
                    }
                }
            }

            private_msg = private_rx.recv() => {
                match private_msg {
                    Some(update) => {
                        let msg = ServerMessage::Private {
                            bits: update.bits,
                            values: update.values,
                        };
                        match send_message(socket, &msg).await {
                            Ok(()) => false,
                            Err(_) => true,
                        }
                    }
                    // World task dropped our lane: we were removed.
                    None => true,
                }
            }
        };
        if disconnect {
            if let Err(err) = socket.close().await.map_err(NetError::Ws) {
                debug!(sid, error = ?err, "socket close failed");
            }
            break;
        }
    }

    if let Err(e) = disconnect_cleanup(ctx).await {
        error!(sid, error = ?e, "disconnect cleanup failed");
        if fatal.is_none() {
            fatal = Some(e);
        }
    }

    match fatal {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn handle_incoming_ws(
    incoming: Option<Result<Message, Error>>,
    sid: u64,
    input_tx: &mpsc::Sender<GameEvent>,
) -> Result<LoopControl, NetError> {
    match incoming {
        Some(Ok(Message::Text(text))) => {
            // Fail closed: a payload that does not parse as a whole
            // command mutates nothing.
            match serde_json::from_str::<CitizenCommand>(&text) {
                Ok(command) => {
                    match input_tx.try_send(GameEvent::Command { sid, command }) {
                        Ok(()) => {}
                        Err(mpsc::error::TrySendError::Full(_)) => {
                            // Mailbox full: drop this command rather
                            // than stall the socket.
                            warn!(sid, "input mailbox full, command dropped");
                        }
                        Err(mpsc::error::TrySendError::Closed(_)) => {
                            return Err(NetError::InputClosed);
                        }
                    }
                    Ok(LoopControl::Continue)
                }
                Err(e) => {
                    debug!(sid, error = %e, "malformed command rejected");
                    Ok(LoopControl::Continue)
                }
            }
        }
        Some(Ok(Message::Close(_))) => Ok(LoopControl::Disconnect),
        // Ping/Pong or Binary; axum answers pings itself.
        Some(Ok(other)) => {
            debug!(sid, message = ?other, "ignoring non-text message");
            Ok(LoopControl::Continue)
        }
        Some(Err(e)) => {
            debug!(sid, error = %e, "websocket recv error");
            Ok(LoopControl::Disconnect)
        }
        None => Ok(LoopControl::Disconnect),
    }
}

async fn disconnect_cleanup(ctx: &mut ConnCtx) -> Result<(), NetError> {
    let sid = ctx.sid;
    ctx.input_tx
        .send(GameEvent::Leave { sid })
        .await
        .map_err(|_| NetError::InputClosed)?;
    info!(sid, "peer disconnected");
    Ok(())
}
