//! WebSocket upgrade handler and per-player connection pump

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::{IntoResponse, Response},
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::{Room, RoomError, RoomMessage};
use crate::http::routes::AppError;
use crate::ws::protocol::ClientEvent;

/// Interval between keepalive pings, regardless of other traffic
pub const PING_INTERVAL: Duration = Duration::from_secs(10);
/// A connection that delivers no frame (pongs included) for this long is dead
pub const PONG_TIMEOUT: Duration = Duration::from_secs(12);
/// Upper bound on a single frame write
pub const WRITE_DEADLINE: Duration = Duration::from_secs(10);
/// Largest inbound message accepted
pub const MAX_MESSAGE_BYTES: usize = 1024;

/// Timing limits for one connection pump
#[derive(Debug, Clone, Copy)]
pub struct PumpLimits {
    pub ping_interval: Duration,
    pub pong_timeout: Duration,
    pub write_deadline: Duration,
}

impl Default for PumpLimits {
    fn default() -> Self {
        Self {
            ping_interval: PING_INTERVAL,
            pong_timeout: PONG_TIMEOUT,
            write_deadline: WRITE_DEADLINE,
        }
    }
}

/// Why a connection pump stopped
#[derive(Debug, thiserror::Error)]
pub enum PumpError {
    #[error("transport error: {0}")]
    Transport(#[from] axum::Error),

    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("no frame within {0:?}")]
    LivenessTimeout(Duration),

    #[error("write exceeded {0:?}")]
    WriteTimeout(Duration),

    #[error("room stopped accepting input")]
    RoomClosed,
}

/// WebSocket upgrade handler for `/room/:room/ws`
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(room_id): Path<String>,
    State(state): State<AppState>,
) -> Response {
    let room = match state.game.get_room(&room_id) {
        Ok(room) => room,
        Err(e) => {
            warn!(room_id = %room_id, "Join attempt for unknown room");
            return AppError::from(e).into_response();
        }
    };

    // Reject before upgrading; add_player re-checks under the room lock
    if room.is_full() {
        info!(room_id = %room.id, "Join rejected, room is full");
        return AppError::from(RoomError::Full).into_response();
    }

    ws.max_message_size(MAX_MESSAGE_BYTES)
        .max_frame_size(MAX_MESSAGE_BYTES)
        .on_upgrade(move |socket| handle_socket(socket, room, PumpLimits::default()))
}

/// Join the room and run the connection pump until either side fails
async fn handle_socket(mut socket: WebSocket, room: Arc<Room>, limits: PumpLimits) {
    let session = match room.add_player() {
        Ok(session) => session,
        Err(e) => {
            info!(room_id = %room.id, error = %e, "Join rejected after upgrade");
            let _ = socket
                .send(Message::Close(Some(CloseFrame {
                    code: close_code::POLICY,
                    reason: e.to_string().into(),
                })))
                .await;
            return;
        }
    };

    let player_id = session.player_id;
    info!(room_id = %room.id, player_id = %player_id, "Player connected");

    let (sink, stream) = socket.split();

    let mut writer = tokio::spawn(write_loop(
        sink,
        session.outbound_rx,
        session.close_rx,
        player_id,
        limits,
    ));

    let mut writer_done = false;
    let outcome = tokio::select! {
        result = read_loop(stream, &room, player_id, limits.pong_timeout) => result,
        joined = &mut writer => {
            writer_done = true;
            joined.unwrap_or(Ok(()))
        }
    };

    // Always leave, whichever side stopped first
    room.remove_player(player_id);

    if !writer_done && timeout(limits.write_deadline, &mut writer).await.is_err() {
        writer.abort();
    }

    match outcome {
        Ok(()) => info!(room_id = %room.id, player_id = %player_id, "Player disconnected"),
        Err(PumpError::Malformed(e)) => {
            error!(room_id = %room.id, player_id = %player_id, error = %e, "Unexpected message format")
        }
        Err(e) => warn!(room_id = %room.id, player_id = %player_id, error = %e, "Connection lost"),
    }
}

/// Drain inbound frames into room messages
async fn read_loop(
    mut stream: SplitStream<WebSocket>,
    room: &Room,
    player_id: Uuid,
    pong_timeout: Duration,
) -> Result<(), PumpError> {
    loop {
        let frame = match timeout(pong_timeout, stream.next()).await {
            Err(_) => return Err(PumpError::LivenessTimeout(pong_timeout)),
            Ok(None) => return Ok(()),
            Ok(Some(frame)) => frame?,
        };

        let event = match frame {
            Message::Text(text) => ClientEvent::decode(text.as_bytes())?,
            Message::Binary(bytes) => ClientEvent::decode(&bytes)?,
            Message::Ping(_) | Message::Pong(_) => continue,
            Message::Close(_) => {
                debug!(player_id = %player_id, "Client initiated close");
                return Ok(());
            }
        };

        debug!(room_id = %room.id, player_id = %player_id, sequence = event.sequence(), "Frame decoded");

        room.submit(RoomMessage { player_id, event })
            .await
            .map_err(|_| PumpError::RoomClosed)?;
    }
}

/// Drain the player's outbound queue to the wire, pinging on a fixed period.
///
/// Pings go out even while snapshots flow, so a client that only listens
/// still produces pongs for the reader's liveness check.
async fn write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut outbound_rx: mpsc::Receiver<String>,
    mut close_rx: oneshot::Receiver<()>,
    player_id: Uuid,
    limits: PumpLimits,
) -> Result<(), PumpError> {
    let deadline = limits.write_deadline;
    let period = limits.ping_interval;
    let mut keepalive = interval_at(Instant::now() + period, period);
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let result = loop {
        tokio::select! {
            queued = outbound_rx.recv() => {
                let Some(text) = queued else {
                    break Ok(());
                };
                if let Err(e) = send_frame(&mut sink, Message::Text(text), deadline).await {
                    break Err(e);
                }
            }
            _ = keepalive.tick() => {
                if let Err(e) = send_frame(&mut sink, Message::Ping(Vec::new()), deadline).await {
                    break Err(e);
                }
            }
            _ = &mut close_rx => {
                debug!(player_id = %player_id, "Room closed connection");
                break Ok(());
            }
        }
    };

    let _ = timeout(deadline, sink.close()).await;
    result
}

async fn send_frame(
    sink: &mut SplitSink<WebSocket, Message>,
    frame: Message,
    deadline: Duration,
) -> Result<(), PumpError> {
    timeout(deadline, sink.send(frame))
        .await
        .map_err(|_| PumpError::WriteTimeout(deadline))??;
    Ok(())
}
