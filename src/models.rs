pub mod auth;
pub mod destination;
pub mod ticket;
