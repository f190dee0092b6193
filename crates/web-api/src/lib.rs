pub mod handlers;
pub mod responses;
pub mod server;

pub use responses::ApiError;
pub use server::{ApiServer, AppState};
