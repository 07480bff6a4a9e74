pub mod cas;
pub mod pool;

pub use cas::CasOutcome;
pub use pool::{connect, health_check, DatabaseError};
