pub mod memory;
pub mod store;
pub mod ticket_repo;
pub mod user_repo;

pub use memory::MemoryStore;
pub use store::{AccountStore, TicketStore};
pub use ticket_repo::TicketRepository;
pub use user_repo::UserRepository;
