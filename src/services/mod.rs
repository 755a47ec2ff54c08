// src/services/mod.rs
pub mod api_client;
pub mod availability;
pub mod credential;
pub mod dispatcher;
pub mod identity;
pub mod slot_board;
pub mod slot_directory;
