//! Persistence of learned word graphs.

pub mod binary;

pub use binary::{read_graph, write_graph};
