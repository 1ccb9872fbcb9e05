pub mod pool;
pub mod repos;

// Re-export commonly used items
pub use pool::{create_pool, ping, run_migrations};
pub use repos::contact::{ContactFilter, ContactRepo, ContactRow};
pub use repos::user::{NewUser, UserRepo, UserRow};
pub use repos::is_unique_violation;
