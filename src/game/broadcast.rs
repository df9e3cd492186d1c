//! Outbound notifications for one match

use tokio::sync::broadcast;
use tracing::trace;
use uuid::Uuid;

use crate::ws::protocol::{Collision, ServerMsg};

/// Fire-and-forget sender; having no subscribers is not an error
#[derive(Clone)]
pub struct Broadcaster {
    match_id: Uuid,
    tx: broadcast::Sender<ServerMsg>,
}

impl Broadcaster {
    pub fn new(match_id: Uuid, tx: broadcast::Sender<ServerMsg>) -> Self {
        Self { match_id, tx }
    }

    pub fn send(&self, msg: ServerMsg) {
        if self.tx.send(msg).is_err() {
            trace!(match_id = %self.match_id, "No subscribers for match event");
        }
    }

    pub fn send_all(&self, msgs: impl IntoIterator<Item = ServerMsg>) {
        for msg in msgs {
            self.send(msg);
        }
    }

    pub fn countdown(&self, countdown_nb: u32) {
        self.send(ServerMsg::Countdown { countdown_nb });
    }

    pub fn scored(&self) {
        self.send(ServerMsg::Scored {
            score_msg: "GOAL".to_string(),
        });
    }

    pub fn collision(&self, collision: Collision) {
        self.send(ServerMsg::CollisionEvent { collision });
    }

    pub fn aborted(&self) {
        self.send(ServerMsg::GameAborted);
    }
}
