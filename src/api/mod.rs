mod handlers;
mod router;
pub mod types;

pub use handlers::{status_for, ApiError};
pub use router::{create_router, AppState};
