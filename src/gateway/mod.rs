//! Gateway server implementation

pub mod router;
mod server;

pub use router::{HEALTH_PATH, Route, RouteSummary, build_routes, clean_path, create_router};
pub use server::Gateway;
