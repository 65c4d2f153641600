pub mod block;
pub mod config;
pub mod physics;
pub mod plugins;
pub mod simulation;
pub mod terrain;
