use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

/// Events carried by the world task's single mailbox. Everything the
/// outside world wants to do to the simulation rides through here, so
/// no mutation ever interleaves with a tick.
#[derive(Debug)]
pub enum GameEvent {
    Join {
        reply: oneshot::Sender<JoinAck>,
        private_tx: mpsc::Sender<PrivateUpdate>,
    },
    Leave {
        sid: u64,
    },
    Command {
        sid: u64,
        command: CitizenCommand,
    },
}

/// Answer to a Join: the assigned sequence id plus a full snapshot that
/// already includes the newly spawned citizen.
#[derive(Debug)]
pub struct JoinAck {
    pub sid: u64,
    pub snapshot: Vec<Value>,
}

/// Observer-specific delta, unicast to the owning peer only.
#[derive(Debug, Clone, Serialize)]
pub struct PrivateUpdate {
    pub bits: u32,
    pub values: Vec<Value>,
}

/// Control messages accepted from clients. Deserialization is
/// all-or-nothing: a malformed payload rejects the whole command and
/// nothing is applied.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum CitizenCommand {
    /// Aim offset relative to the citizen's position.
    Pointer { x: f32, y: f32 },
    /// Movement input vector; components are clamped to [-1, 1].
    Movement { x: f32, y: f32 },
    Action { action: ActionKind },
    Growl { on: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Attack,
    Block,
    Roll,
    Spin,
    ChargeStart,
    ChargeStop,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Tells the client which sid it owns.
    Welcome { sid: u64 },
    /// Full world state for a newly welcomed peer: one
    /// `[type_index, ...values]` row per live entity.
    Snapshot { entities: Vec<Value> },
    /// Batched deltas: one `[sid, bitmask, ...values]` row per entity
    /// that changed since the last broadcast flush.
    Update { entities: Vec<Value> },
    /// Observer-specific fields addressed by the private schema's
    /// bitmask.
    Private { bits: u32, values: Vec<Value> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_parse_from_tagged_json() {
        let cmd: CitizenCommand =
            serde_json::from_str(r#"{"type":"movement","data":{"x":1.0,"y":-0.5}}"#)
                .expect("valid movement");
        match cmd {
            CitizenCommand::Movement { x, y } => {
                assert_eq!(x, 1.0);
                assert_eq!(y, -0.5);
            }
            other => panic!("unexpected command: {other:?}"),
        }

        let cmd: CitizenCommand =
            serde_json::from_str(r#"{"type":"action","data":{"action":"roll"}}"#)
                .expect("valid action");
        assert!(matches!(
            cmd,
            CitizenCommand::Action {
                action: ActionKind::Roll
            }
        ));

        let cmd: CitizenCommand =
            serde_json::from_str(r#"{"type":"action","data":{"action":"charge_start"}}"#)
                .expect("valid charge start");
        assert!(matches!(
            cmd,
            CitizenCommand::Action {
                action: ActionKind::ChargeStart
            }
        ));
    }

    #[test]
    fn malformed_command_fails_closed() {
        assert!(serde_json::from_str::<CitizenCommand>(r#"{"type":"warp","data":{}}"#).is_err());
        assert!(
            serde_json::from_str::<CitizenCommand>(r#"{"type":"pointer","data":{"x":"oops"}}"#)
                .is_err()
        );
    }

    #[test]
    fn update_envelope_serializes_rows_inline() {
        let row = Value::Array(vec![
            Value::from(7u64),
            Value::from(0b101u32),
            Value::from(3),
        ]);
        let msg = ServerMessage::Update {
            entities: vec![row],
        };
        let text = serde_json::to_string(&msg).expect("serialize");
        assert_eq!(text, r#"{"type":"update","data":{"entities":[[7,5,3]]}}"#);
    }
}
