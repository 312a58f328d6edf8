pub mod checkpoints;
pub mod common;
pub mod completions;
pub mod delete;
pub mod list;
pub mod migrate;
pub mod put;
pub mod sync;
