pub mod banlist;
pub mod composer;
pub mod filters;
pub mod history;
pub mod materializer;
pub mod mixer;
pub mod pools;

pub use banlist::BanList;
pub use composer::{MixPolicy, MixPools, compose_mix};
pub use history::PlaylistHistory;
pub use materializer::{MaterializeOutcome, Materializer};
pub use mixer::mix_order;
