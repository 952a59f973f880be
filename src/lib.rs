pub mod collision;
pub mod config;
pub mod game;
pub mod net;
pub mod protocol;
pub mod server;
pub mod state;
pub mod tuning;
pub mod world;
