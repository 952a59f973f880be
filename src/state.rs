use crate::protocol::GameEvent;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};

#[derive(Clone)]
pub struct AppState {
    pub input_tx: mpsc::Sender<GameEvent>,
    pub world_tx: broadcast::Sender<WorldUpdate>,
}

/// One broadcast-tick worth of delta rows, shared across all clients.
#[derive(Debug, Clone)]
pub struct WorldUpdate {
    pub entities: Vec<Value>,
}
