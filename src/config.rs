use std::{env, time::Duration};

// Runtime/server constants (not gameplay tuning).

pub fn ws_port() -> u16 {
    env::var("SKIRMISH_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8002)
}

pub fn bot_count() -> usize {
    env::var("SKIRMISH_BOTS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}

pub const INPUT_CHANNEL_CAPACITY: usize = 1024;
pub const WORLD_BROADCAST_CAPACITY: usize = 128;
pub const PRIVATE_CHANNEL_CAPACITY: usize = 32;

// The simulation steps faster than it broadcasts; the delta rows of
// intermediate steps accumulate per tick and flush on the slower clock.
pub const SIM_INTERVAL: Duration = Duration::from_millis(1000 / 30);
pub const BROADCAST_INTERVAL: Duration = Duration::from_millis(1000 / 20);
pub const PRIVATE_FLUSH_INTERVAL: Duration = Duration::from_millis(1000 / 5);

pub const WORLD_WIDTH: f32 = 800.0;
pub const WORLD_HEIGHT: f32 = 600.0;
pub const GRID_CELL_SIZE: f32 = 16.0;
