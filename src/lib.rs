pub mod bridge;
pub mod config;
pub mod error;
pub mod model;
pub mod preview;
pub mod selection;
pub mod sync;
