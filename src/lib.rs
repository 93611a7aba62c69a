//! Client-side state for the Midas personal finance tracker.
//!
//! Remote collections are mirrored into filter-aware caches that are
//! refreshed in the background and after every mutation. The terminal
//! front end in `main.rs` sits on top of [`store::Store`].

pub mod api;
pub mod cache;
pub mod clock;
pub mod config;
pub mod edit;
pub mod feed;
pub mod models;
pub mod refresh;
pub mod selection;
pub mod store;

#[cfg(test)]
mod testing;
