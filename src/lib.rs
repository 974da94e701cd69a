#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

pub mod core;
pub mod error;
pub mod index;
pub mod stats;
pub mod storage;
pub mod update;

pub use error::{FeedError, Result};
