//! Word-graph language model library and CLI.
//!
//! Text is tokenized into typed tokens, each line bracketed by START and END sentinels, and
//! every observed transition is counted in a graph of word nodes. Generation walks that graph
//! from START to END, sampling successors by frequency, and renders the walk back into text
//! with spacing and capitalization restored. The same transition statistics drive word
//! similarity, path probability estimates and agglomerative clustering of the vocabulary.
//!
//! ```no_run
//! use wordweave::{IngestConfig, Lexicon, ModelConfig, WordModel};
//!
//! # fn main() -> wordweave::Result<()> {
//! let config = ModelConfig::builder().seed(Some(42)).build()?;
//! let mut model = WordModel::new(config)?;
//! model.learn_from_paths(&["/path/to/corpus"], &IngestConfig::default(), &Lexicon::default())?;
//! println!("{}", model.think_line()?.trim_end());
//! model.save("model.bin")?;
//! # Ok(())
//! # }
//! ```
//!
//! The CLI is enabled by default through the `cli` feature. Users targeting the library
//! portion only can disable default features to avoid the CLI dependencies:
//! `wordweave = { version = "...", default-features = false }`.

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    clippy::all,
    rust_2018_idioms,
    future_incompatible,
    unused_lifetimes,
    unreachable_pub
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::doc_markdown,
    clippy::multiple_crate_versions
)]

pub mod bytes;
pub mod cluster;
pub mod config;
pub mod corpus;
pub mod detokenizer;
pub mod error;
pub mod frec;
pub mod graph;
pub mod metrics;
pub mod model;
pub mod serialization;
pub mod token;
pub mod tokenizer;

pub use cluster::{cluster, Cluster, ClusterId, Clusterer, Dendrogram, Merge};
pub use config::{
    ClusterBuilder, ClusterConfig, IngestBuilder, IngestConfig, Lexicon, LexiconBuilder,
    ModelBuilder, ModelConfig, Sampling,
};
pub use detokenizer::TextWriter;
pub use error::{Result, WeaveError};
pub use frec::{Count, FrecTable};
pub use graph::{NodeId, WordGraph, WordNode};
pub use metrics::{ClusterMetrics, ModelStats};
pub use model::WordModel;
pub use token::{Category, Token};
pub use tokenizer::{tokenize_line, TextReader};
