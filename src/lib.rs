// src/lib.rs

pub mod api;
pub mod config;
pub mod memory;
pub mod state;

pub use state::AppState;
