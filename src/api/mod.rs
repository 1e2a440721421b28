//! HTTP surface of the sankey service.

pub mod error;
pub mod handlers;
pub mod router;

pub use error::AppError;
pub use router::build_router;
