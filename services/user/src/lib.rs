pub mod models;
pub mod password;
pub mod router;
pub mod service;


pub use models::UserCommand;
pub use router::{create_router, AppState};
pub use service::UserService;

/// Command queue consumed by the user worker.
pub const USER_QUEUE: &str = "userQueue";
