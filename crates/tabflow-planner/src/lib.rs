#![forbid(unsafe_code)]
#![cfg_attr(not(test), deny(clippy::expect_used, clippy::unwrap_used))]

pub mod capacity;
pub mod concurrency;
pub mod slots;
pub mod splits;
