// src/models/mod.rs
pub mod crm;
pub mod slot;
pub mod subject;
