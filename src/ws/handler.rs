//! WebSocket upgrade handler

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::Response,
};
use futures::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::entities::PADDLE_SPEED;
use crate::game::{MatchRegistry, MatchSupervisor};
use crate::store::{Field, ScopedStore};
use crate::util::rate_limit::CommandRateLimiter;
use crate::ws::protocol::{ClientMsg, Direction, ServerMsg};

/// WebSocket upgrade handler for one match
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(match_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Response {
    info!(match_id = %match_id, "WebSocket upgrade");
    ws.on_upgrade(move |socket| handle_socket(socket, match_id, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, match_id: Uuid, state: AppState) {
    let supervisor = state.registry.get_or_create(match_id);
    let connections = supervisor.connect();
    info!(match_id = %match_id, connections, "Client connected");

    let (ws_sink, ws_stream) = socket.split();
    run_session(
        match_id,
        state.store.scoped(match_id),
        ws_sink,
        ws_stream,
        supervisor.subscribe(),
    )
    .await;

    release(&state.registry, &supervisor);
}

/// Drop one connection; the last one out stops the match
fn release(registry: &MatchRegistry, supervisor: &Arc<MatchSupervisor>) {
    let match_id = supervisor.match_id();
    let remaining = supervisor.disconnect();
    info!(match_id = %match_id, remaining, "Client disconnected");

    if remaining > 0 {
        return;
    }
    if supervisor.is_started() {
        info!(match_id = %match_id, "All clients gone, stopping match");
        registry.stop(&match_id);
    } else {
        registry.remove(supervisor);
    }
}

/// Run the WebSocket session with read/write split
async fn run_session(
    match_id: Uuid,
    store: ScopedStore,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut ws_stream: SplitStream<WebSocket>,
    mut events_rx: broadcast::Receiver<ServerMsg>,
) {
    let rate_limiter = CommandRateLimiter::new();

    // Writer task: match events -> WebSocket
    let writer_handle = tokio::spawn(async move {
        loop {
            match events_rx.recv().await {
                Ok(msg) => {
                    if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                        debug!(match_id = %match_id, error = %e, "WebSocket send failed");
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(match_id = %match_id, lagged_count = n, "Client lagged, events skipped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!(match_id = %match_id, "Event channel closed");
                    break;
                }
            }
        }
    });

    // Reader loop: WebSocket -> store
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check() {
                    warn!(match_id = %match_id, "Rate limited paddle command");
                    continue;
                }
                match ClientMsg::parse(&text) {
                    Some(msg) => {
                        if !apply_command(&store, &msg) {
                            debug!(match_id = %match_id, "Dropped command for inactive match");
                        }
                    }
                    None => debug!(match_id = %match_id, "Dropped malformed command"),
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(match_id = %match_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(match_id = %match_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(match_id = %match_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    writer_handle.abort();
}

/// Write a paddle command as the side's raw velocity.
/// Commands for a match without live state are dropped.
pub fn apply_command(store: &ScopedStore, msg: &ClientMsg) -> bool {
    match *msg {
        ClientMsg::StartMove { player, direction } => {
            let velocity = match direction {
                Direction::Up => -PADDLE_SPEED,
                Direction::Down => PADDLE_SPEED,
            };
            store.update(Field::PaddleInput(player), velocity)
        }
        ClientMsg::StopMove { player } => store.update(Field::PaddleInput(player), 0),
    }
}

/// Send a message over WebSocket
async fn send_msg(sink: &mut SplitSink<WebSocket, Message>, msg: &ServerMsg) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StateStore;
    use crate::ws::protocol::Side;

    #[test]
    fn commands_set_raw_velocity() {
        let store = StateStore::new().scoped(Uuid::new_v4());
        store.set(Field::Score(Side::Left), 0);

        let up = ClientMsg::parse(r#"{"action":"start_move","player":"left","direction":"up"}"#);
        apply_command(&store, &up.unwrap());
        assert_eq!(store.f32(Field::PaddleInput(Side::Left)), -8.0);

        let down = ClientMsg::parse(r#"{"action":"start_move","player":"right","direction":"down"}"#);
        apply_command(&store, &down.unwrap());
        assert_eq!(store.f32(Field::PaddleInput(Side::Right)), 8.0);

        let stop = ClientMsg::parse(r#"{"action":"stop_move","player":"left"}"#);
        apply_command(&store, &stop.unwrap());
        assert_eq!(store.f32(Field::PaddleInput(Side::Left)), 0.0);
    }

    #[test]
    fn late_command_after_clear_is_dropped() {
        let store = StateStore::new().scoped(Uuid::new_v4());
        store.set(Field::BallX, 400.0);
        store.clear();

        let stop = ClientMsg::parse(r#"{"action":"stop_move","player":"left"}"#).unwrap();
        assert!(!apply_command(&store, &stop));
        let up = ClientMsg::parse(r#"{"action":"start_move","player":"right","direction":"up"}"#);
        assert!(!apply_command(&store, &up.unwrap()));
        assert_eq!(store.key_count(), 0);
    }

    #[test]
    fn out_of_range_commands_are_dropped() {
        assert!(ClientMsg::parse(r#"{"action":"start_move","player":"middle","direction":"up"}"#)
            .is_none());
        assert!(ClientMsg::parse(r#"{"action":"start_move","player":"left"}"#).is_none());
        assert!(ClientMsg::parse("not json").is_none());
    }

    #[test]
    fn last_disconnect_stops_started_match() {
        let registry = MatchRegistry::new();
        let id = Uuid::new_v4();
        let supervisor = registry.get_or_create(id);
        supervisor.mark_started();
        supervisor.connect();
        supervisor.connect();

        release(&registry, &supervisor);
        assert!(!supervisor.is_cancelled());
        release(&registry, &supervisor);
        assert!(supervisor.is_cancelled());
    }

    #[test]
    fn idle_entry_is_dropped_on_last_disconnect() {
        let registry = MatchRegistry::new();
        let id = Uuid::new_v4();
        let supervisor = registry.get_or_create(id);
        supervisor.connect();

        release(&registry, &supervisor);
        assert!(registry.get(&id).is_none());
        assert!(!supervisor.is_cancelled());
    }
}
