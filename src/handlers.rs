// src/handlers.rs

pub mod auth;
pub mod destinations;
pub mod documents;
pub mod tickets;
