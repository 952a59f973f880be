use crate::config;
use crate::protocol::{GameEvent, JoinAck, PrivateUpdate};
use crate::state::WorldUpdate;
use crate::world::World;
use crate::world::citizen::Controller;

use serde_json::Value;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

/// A connected peer's unicast half. The broadcast channel is shared;
/// private deltas need a dedicated lane per connection.
struct PeerLink {
    sid: u64,
    private_tx: mpsc::Sender<PrivateUpdate>,
}

/// The single world task. Owns the simulation outright; every outside
/// mutation arrives through the mailbox, every outbound update leaves
/// through the broadcast or a peer's private lane.
pub async fn world_task(
    mut input_rx: mpsc::Receiver<GameEvent>,
    world_tx: broadcast::Sender<WorldUpdate>,
) {
    let mut world = World::new(
        config::WORLD_WIDTH,
        config::WORLD_HEIGHT,
        config::GRID_CELL_SIZE,
    );
    let mut peers: Vec<PeerLink> = Vec::new();

    for i in 0..config::bot_count() {
        let (x, y) = scatter(i as u64 * 97);
        world.spawn_citizen(format!("bot-{i}"), x, y, Controller::Bot(Default::default()));
    }

    // Delta rows pile up across sim steps and flush on the slower
    // broadcast clock.
    let mut pending_rows: Vec<Value> = Vec::new();

    let mut sim = tokio::time::interval(config::SIM_INTERVAL);
    let mut broadcast_tick = tokio::time::interval(config::BROADCAST_INTERVAL);
    let mut private_tick = tokio::time::interval(config::PRIVATE_FLUSH_INTERVAL);
    let mut last_step = Instant::now();

    loop {
        tokio::select! {
            _ = sim.tick() => {
                while let Ok(event) = input_rx.try_recv() {
                    handle_event(event, &mut world, &mut peers);
                }

                let now = Instant::now();
                let dt = (now - last_step).as_secs_f32();
                last_step = now;

                pending_rows.extend(world.step(dt));
            }

            _ = broadcast_tick.tick() => {
                if !pending_rows.is_empty() {
                    // Send fails only with zero subscribers; the rows
                    // are already consumed either way.
                    let _ = world_tx.send(WorldUpdate {
                        entities: std::mem::take(&mut pending_rows),
                    });
                }
            }

            _ = private_tick.tick() => {
                for peer in &peers {
                    let Some(update) = world.drain_private(peer.sid) else {
                        continue;
                    };
                    if let Err(e) = peer.private_tx.try_send(update) {
                        // Slow or closed lane; Leave cleans up closed
                        // peers, so just note the drop.
                        debug!(sid = peer.sid, error = ?e, "private update dropped");
                    }
                }
            }
        }
    }
}

fn handle_event(event: GameEvent, world: &mut World, peers: &mut Vec<PeerLink>) {
    match event {
        GameEvent::Join { reply, private_tx } => {
            let (x, y) = scatter(0);
            let sid = world.spawn_citizen(String::new(), x, y, Controller::Player);
            if let Some(c) = world.citizen_mut(sid) {
                c.name = format!("guest-{sid}");
            }
            peers.push(PeerLink { sid, private_tx });

            // Snapshot taken after the spawn so the joiner sees itself.
            let ack = JoinAck {
                sid,
                snapshot: world.snapshot(),
            };
            if reply.send(ack).is_err() {
                // Peer vanished between upgrade and ack; undo the spawn.
                warn!(sid, "join ack dropped, despawning");
                world.remove_citizen(sid);
                peers.retain(|p| p.sid != sid);
            }
        }
        GameEvent::Leave { sid } => {
            world.remove_citizen(sid);
            peers.retain(|p| p.sid != sid);
            info!(sid, "peer left");
        }
        GameEvent::Command { sid, command } => {
            world.queue_command(sid, command);
        }
    }
}

/// Deterministic-enough spawn scatter off the wall clock.
fn scatter(salt: u64) -> (f32, f32) {
    let micros = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros() as u64;
    let seed = micros.wrapping_add(salt.wrapping_mul(0x9e37_79b9));
    let x = 60.0 + (seed % 680) as f32;
    let y = 60.0 + ((seed / 680) % 480) as f32;
    (x, y)
}
