mod client;
mod discover;
mod pair;

pub use client::{BridgeClient, BridgeCommands};
pub use discover::{BridgeCandidate, discover};
pub use pair::{PairOutcome, pair_once, pair_with_retry};
