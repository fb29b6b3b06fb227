pub mod audit;
pub mod brands;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod misfits;
pub mod routes;

pub use routes::create_router;
