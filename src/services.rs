pub mod access_policy;
pub mod allocator;
pub mod auth;
pub mod destination_service;
pub mod document_service;
pub mod query_service;
pub mod share;
pub mod ticket_service;
