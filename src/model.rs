//! The word model: learns token transitions and walks them to generate text.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::{IngestConfig, Lexicon, ModelConfig, Sampling};
use crate::corpus::load_text_lines;
use crate::detokenizer::TextWriter;
use crate::error::{Result, WeaveError};
use crate::graph::{NodeId, WordGraph};
use crate::metrics::ModelStats;
use crate::serialization::{read_graph, write_graph};
use crate::token::Token;
use crate::tokenizer::TextReader;

const PROGRESS_INTERVAL: usize = 10_000;

/// Word graph plus the sampling engine and settings used to walk it.
///
/// ```
/// use wordweave::{Lexicon, ModelConfig, Sampling, WordModel};
///
/// let config = ModelConfig::builder().sampling(Sampling::Greedy).build()?;
/// let mut model = WordModel::new(config)?;
/// model.learn_line(b"Hello, world!", &Lexicon::default());
/// assert_eq!(model.think_line()?, "Hello, world!\n");
/// # Ok::<(), wordweave::WeaveError>(())
/// ```
#[derive(Debug)]
pub struct WordModel {
    graph: WordGraph,
    config: ModelConfig,
    rng: StdRng,
}

impl WordModel {
    /// Creates an empty model.
    pub fn new(config: ModelConfig) -> Result<Self> {
        Self::with_graph(WordGraph::new(), config)
    }

    /// Wraps an existing graph.
    pub fn with_graph(graph: WordGraph, config: ModelConfig) -> Result<Self> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self { graph, config, rng })
    }

    /// Settings the model was built with.
    #[must_use]
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// The learned graph.
    #[must_use]
    pub fn graph(&self) -> &WordGraph {
        &self.graph
    }

    /// Restarts the sampling engine from `seed`.
    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Learns every token `reader` still has to offer. Returns the number of tokens learned.
    pub fn learn(&mut self, reader: &mut TextReader<'_>) -> usize {
        let mut learned = 0;
        let mut prev = None;
        while reader.has_words() {
            let Some(token) = reader.read() else {
                break;
            };
            prev = Some(self.learn_after(prev, &token));
            learned += 1;
        }
        learned
    }

    /// Learns an already tokenized sequence, sentinels included.
    pub fn learn_tokens<I>(&mut self, tokens: I) -> usize
    where
        I: IntoIterator<Item = Token>,
    {
        let mut learned = 0;
        let mut prev = None;
        for token in tokens {
            prev = Some(self.learn_after(prev, &token));
            learned += 1;
        }
        learned
    }

    fn learn_after(&mut self, prev: Option<NodeId>, token: &Token) -> NodeId {
        let id = self.graph.add_word(token);
        if let Some(prev) = prev {
            self.graph.add_link_ids(prev, id);
        }
        id
    }

    /// Tokenizes and learns one line of text.
    pub fn learn_line(&mut self, line: &[u8], lexicon: &Lexicon) -> usize {
        self.learn(&mut TextReader::new(line, lexicon))
    }

    /// Learns each line in turn. Returns the number of lines learned.
    pub fn learn_lines<I, L>(&mut self, lines: I, lexicon: &Lexicon) -> usize
    where
        I: IntoIterator<Item = L>,
        L: AsRef<[u8]>,
    {
        let mut count = 0usize;
        for line in lines {
            self.learn_line(line.as_ref(), lexicon);
            count += 1;
            if self.config.show_progress && count % PROGRESS_INTERVAL == 0 {
                info!("learned {count} lines ({} nodes)", self.graph.len());
            }
        }
        if self.config.show_progress {
            info!(
                "learned {count} lines: {} nodes, {} links",
                self.graph.len(),
                self.graph.link_count()
            );
        }
        count
    }

    /// Loads text files from disk according to [`IngestConfig`] and learns every line.
    pub fn learn_from_paths<P: AsRef<Path>>(
        &mut self,
        inputs: &[P],
        ingest: &IngestConfig,
        lexicon: &Lexicon,
    ) -> Result<usize> {
        lexicon.validate()?;
        let lines = load_text_lines(inputs, ingest)?;
        Ok(self.learn_lines(&lines, lexicon))
    }

    /// Generates one line into `writer`, END included. Returns the number of tokens walked
    /// before END.
    ///
    /// The walk starts at START and follows sampled successors until it reaches END, meets a
    /// node without successors, or exhausts the step limit. END is written in every case.
    pub fn think<W: Write>(&mut self, writer: &mut TextWriter<W>) -> Result<usize> {
        let start = self.ensure_node(&Token::start());
        let end = self.ensure_node(&Token::end());
        let limit = self.walk_limit();

        let mut current = start;
        let mut steps = 0usize;
        while current != end {
            let node = self
                .graph
                .get(current)
                .ok_or_else(|| WeaveError::Internal(format!("dangling node handle {current}")))?;
            writer.write(node.token())?;
            steps += 1;
            if steps >= limit {
                debug!("walk stopped after {steps} steps without reaching END");
                break;
            }
            let next = match self.config.sampling {
                Sampling::Greedy => node.outgoing().top(),
                Sampling::Weighted => node.outgoing().sample(&mut self.rng),
            };
            match next {
                Some(next) => current = next,
                None => {
                    warn!("{} has no successor; ending the line early", node.token());
                    break;
                }
            }
        }
        writer.write(&Token::end())?;
        Ok(steps)
    }

    /// Generates one line and returns it rendered, newline included.
    pub fn think_line(&mut self) -> Result<String> {
        let mut writer = TextWriter::new(Vec::new());
        self.think(&mut writer)?;
        String::from_utf8(writer.into_inner()).map_err(|err| WeaveError::Internal(err.to_string()))
    }

    fn ensure_node(&mut self, token: &Token) -> NodeId {
        match self.graph.id_of(token) {
            Some(id) => id,
            None => self.graph.add_word(token),
        }
    }

    fn walk_limit(&self) -> usize {
        let cap = self.config.max_walk_steps.unwrap_or(usize::MAX);
        match self.config.sampling {
            Sampling::Greedy => cap.min(self.graph.len().max(1)),
            Sampling::Weighted => cap,
        }
    }

    /// Word similarity in `[0, 1]`, see [`WordGraph::similarity`].
    #[must_use]
    pub fn similarity(&self, a: &Token, b: &Token) -> f64 {
        self.graph.similarity(a, b)
    }

    /// Path probability using the configured floor, see [`WordGraph::path_probability`].
    #[must_use]
    pub fn path_probability(&self, path: &[Token], candidates: &[Token]) -> f64 {
        self.graph.path_probability(path, candidates, self.config.path_floor)
    }

    /// Size and usage figures.
    #[must_use]
    pub fn stats(&self) -> ModelStats {
        let mut stats = ModelStats {
            nodes: self.graph.len(),
            links: self.graph.link_count(),
            ..ModelStats::default()
        };
        for (_, node) in self.graph.nodes() {
            stats.tokens_learned += u64::from(node.count());
            if node.token().is_sentinel() {
                if node.token() == &Token::start() {
                    stats.lines_learned = u64::from(node.count());
                }
            } else {
                stats.vocabulary += 1;
            }
        }
        stats
    }

    /// Writes the graph in the binary model layout.
    pub fn serialize<W: Write>(&self, sink: &mut W) -> Result<()> {
        write_graph(&self.graph, sink)
    }

    /// Replaces the graph with one read from `source`. On error the model is left untouched.
    pub fn deserialize<R: Read>(&mut self, source: &mut R) -> Result<()> {
        self.graph = read_graph(source)?;
        Ok(())
    }

    /// Saves the model to `path`.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|err| WeaveError::io(err, Some(path.into())))?;
        let mut sink = BufWriter::new(file);
        self.serialize(&mut sink).map_err(|err| with_path(err, path))?;
        sink.flush().map_err(|err| WeaveError::io(err, Some(path.into())))
    }

    /// Loads a model saved with [`WordModel::save`].
    pub fn load<P: AsRef<Path>>(path: P, config: ModelConfig) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|err| WeaveError::io(err, Some(path.into())))?;
        let graph = read_graph(&mut BufReader::new(file)).map_err(|err| with_path(err, path))?;
        if config.show_progress {
            info!(
                "loaded {} nodes and {} links from {}",
                graph.len(),
                graph.link_count(),
                path.display()
            );
        }
        Self::with_graph(graph, config)
    }
}

fn with_path(err: WeaveError, path: &Path) -> WeaveError {
    match err {
        WeaveError::Io { source, path: None } => WeaveError::io(source, Some(path.into())),
        other => other,
    }
}
