pub mod error;
pub mod routes;
pub mod session;
pub mod state;
pub mod telegram;

pub use routes::router;
pub use state::{AppState, AppStateInner};
