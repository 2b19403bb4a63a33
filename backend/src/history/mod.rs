pub mod client;
pub mod errors;
pub mod types;

pub use client::{HistoryClient, points_from_swaps};
pub use errors::HistoryError;
pub use types::*;
