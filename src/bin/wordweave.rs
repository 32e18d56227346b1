use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use env_logger::Env;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use rayon::ThreadPoolBuilder;
use serde_json::json;
use wordweave::{
    cluster, tokenize_line, ClusterConfig, IngestConfig, Lexicon, ModelConfig, Sampling,
    TextWriter, Token, WordModel,
};

const DEFAULT_OUTPUT: &str = "model.bin";

#[derive(Parser, Debug)]
#[command(author, version, about = "Word-graph language model toolkit", long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Decrease verbosity (-q, -qq)
    #[arg(short = 'q', long, global = true, action = ArgAction::Count)]
    quiet: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Learn a model from text files
    Learn(LearnArgs),
    /// Generate lines from a model
    Think(ThinkArgs),
    /// Inspect model statistics
    Info(InfoArgs),
    /// Cluster the vocabulary of a model
    Cluster(ClusterArgs),
    /// Estimate how likely a phrase grows backward through candidate words
    Score(ScoreArgs),
}

#[derive(Args, Debug)]
struct LearnArgs {
    /// Files or directories to ingest
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output path for the model
    #[arg(short, long, value_name = "PATH", default_value = DEFAULT_OUTPUT)]
    output: PathBuf,

    /// Existing model to keep learning into
    #[arg(short = 'm', long, value_name = "PATH")]
    model: Option<PathBuf>,

    /// Lexicon JSON overriding the tokenizer character sets
    #[arg(long, value_name = "PATH")]
    lexicon: Option<PathBuf>,

    /// Disable progress logging and spinner
    #[arg(long)]
    no_progress: bool,

    /// Disable recursive directory traversal
    #[arg(long)]
    no_recursive: bool,

    /// Follow symlinks during traversal
    #[arg(long)]
    follow_symlinks: bool,
}

#[derive(Args, Debug)]
struct ThinkArgs {
    /// Model to load
    #[arg(short = 'm', long, value_name = "PATH")]
    model: PathBuf,

    /// Number of lines to generate
    #[arg(short = 'n', long, value_name = "COUNT", default_value_t = 1)]
    count: usize,

    /// Seed for reproducible output
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,

    /// Always follow the most frequent successor
    #[arg(long)]
    greedy: bool,

    /// Maximum tokens per generated line
    #[arg(long, value_name = "COUNT")]
    max_steps: Option<usize>,
}

#[derive(Args, Debug)]
struct InfoArgs {
    /// Model to inspect
    #[arg(short = 'm', long, value_name = "PATH")]
    model: PathBuf,

    /// Emit machine-readable JSON summary
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct ClusterArgs {
    /// Model to load
    #[arg(short = 'm', long, value_name = "PATH")]
    model: PathBuf,

    /// Keep merges whose similarity is at least this value
    #[arg(long, value_name = "SIMILARITY", conflicts_with = "clusters")]
    threshold: Option<f64>,

    /// Cut the merge history into this many clusters
    #[arg(long, value_name = "COUNT")]
    clusters: Option<usize>,

    /// Emit JSON instead of human-readable output
    #[arg(long)]
    json: bool,

    /// Limit Rayon worker threads
    #[arg(long, value_name = "N")]
    threads: Option<usize>,

    /// Cluster the START/END sentinels too
    #[arg(long)]
    include_sentinels: bool,

    /// Bound the similarity cache to this many entries
    #[arg(long, value_name = "ENTRIES")]
    cache_capacity: Option<usize>,
}

#[derive(Args, Debug)]
struct ScoreArgs {
    /// Model to load
    #[arg(short = 'm', long, value_name = "PATH")]
    model: PathBuf,

    /// Whitespace separated candidate words
    #[arg(long, value_name = "WORDS")]
    candidates: String,

    /// Floor applied at every step of the estimate
    #[arg(long, value_name = "FLOOR")]
    floor: Option<f64>,

    /// Lexicon JSON the model was learned with
    #[arg(long, value_name = "PATH")]
    lexicon: Option<PathBuf>,

    /// Phrase to score, head first
    #[arg(required = true)]
    phrase: Vec<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Learn(args) => run_learn(args),
        Commands::Think(args) => run_think(args),
        Commands::Info(args) => run_info(args),
        Commands::Cluster(args) => run_cluster(args),
        Commands::Score(args) => run_score(args),
    }
}

fn init_logging(verbose: u8, quiet: u8) {
    use log::LevelFilter;

    let level = if quiet > 0 {
        match quiet {
            1 => LevelFilter::Warn,
            _ => LevelFilter::Error,
        }
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    builder.format_timestamp_millis();
    builder.filter_level(level);
    let _ = builder.try_init();
}

fn load_model(path: &Path, config: ModelConfig) -> Result<WordModel> {
    WordModel::load(path, config)
        .with_context(|| format!("failed to load model from {}", path.display()))
}

fn load_lexicon(path: Option<&Path>) -> Result<Lexicon> {
    match path {
        Some(path) => Lexicon::from_json_file(path)
            .with_context(|| format!("failed to load lexicon from {}", path.display())),
        None => Ok(Lexicon::default()),
    }
}

fn run_learn(args: LearnArgs) -> Result<()> {
    let config = ModelConfig::builder()
        .show_progress(!args.no_progress)
        .build()?;
    let lexicon = load_lexicon(args.lexicon.as_deref())?;
    let ingest = IngestConfig::builder()
        .recursive(!args.no_recursive)
        .follow_symlinks(args.follow_symlinks)
        .build();

    let mut model = match &args.model {
        Some(path) => load_model(path, config)?,
        None => WordModel::new(config)?,
    };

    let spinner = if args.no_progress {
        None
    } else {
        let pb = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner} learning lines... {elapsed}")
            .context("invalid progress template")?
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
        pb.set_style(style);
        pb.enable_steady_tick(Duration::from_millis(80));
        Some(pb)
    };

    let start = Instant::now();
    let lines = model
        .learn_from_paths(&args.inputs, &ingest, &lexicon)
        .with_context(|| "failed to learn from inputs")?;
    if let Some(pb) = spinner {
        pb.finish_with_message("learning complete");
    }
    let elapsed = start.elapsed();

    model
        .save(&args.output)
        .with_context(|| format!("failed to save model to {}", args.output.display()))?;

    let stats = model.stats();
    info!(
        "learning complete: lines={lines} nodes={} links={} duration={elapsed:.2?}",
        stats.nodes, stats.links
    );
    println!(
        "wrote model with {} words ({} links) to {}",
        stats.vocabulary,
        stats.links,
        args.output.display()
    );
    println!("   learned {lines} lines | duration {elapsed:.2?}");
    Ok(())
}

fn run_think(args: ThinkArgs) -> Result<()> {
    let sampling = if args.greedy {
        Sampling::Greedy
    } else {
        Sampling::Weighted
    };
    let mut builder = ModelConfig::builder().seed(args.seed).sampling(sampling);
    if let Some(steps) = args.max_steps {
        builder = builder.max_walk_steps(Some(steps));
    }
    let mut model = load_model(&args.model, builder.build()?)?;

    let stdout = io::stdout();
    let mut writer = TextWriter::new(stdout.lock());
    for _ in 0..args.count {
        model
            .think(&mut writer)
            .context("failed to generate a line")?;
    }
    writer.flush()?;
    Ok(())
}

fn run_info(args: InfoArgs) -> Result<()> {
    let model = load_model(&args.model, ModelConfig::default())?;
    let stats = model.stats();

    if args.json {
        let summary = json!({
            "path": args.model.display().to_string(),
            "stats": stats,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Nodes         : {}", stats.nodes);
        println!("Links         : {}", stats.links);
        println!("Vocabulary    : {}", stats.vocabulary);
        println!("Lines learned : {}", stats.lines_learned);
        println!("Tokens learned: {}", stats.tokens_learned);
    }
    Ok(())
}

fn run_cluster(args: ClusterArgs) -> Result<()> {
    if let Some(threads) = args.threads {
        ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("unable to configure Rayon thread pool")?;
    }
    let model = load_model(&args.model, ModelConfig::default())?;
    let config = ClusterConfig::builder()
        .show_progress(!args.json)
        .include_sentinels(args.include_sentinels)
        .cache_capacity(args.cache_capacity)
        .build()?;

    let (dendrogram, metrics) = cluster(model.graph(), &config)?;
    let partition = match (args.threshold, args.clusters) {
        (Some(threshold), _) => Some(dendrogram.cut_threshold(threshold)),
        (None, Some(count)) => Some(dendrogram.cut_count(count)),
        (None, None) => None,
    };

    if args.json {
        let summary = match &partition {
            Some(groups) => json!({
                "clusters": groups.iter().map(|group| words(group)).collect::<Vec<_>>(),
                "metrics": metrics,
            }),
            None => json!({ "dendrogram": dendrogram, "metrics": metrics }),
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    match partition {
        Some(groups) => {
            for (idx, group) in groups.iter().enumerate() {
                println!("{idx:>4} ({:>3}): {}", group.len(), words(group).join(" "));
            }
        }
        None => {
            for merge in dendrogram.merges() {
                println!(
                    "{} + {} -> {}  similarity {:.4}  size {}",
                    merge.survivor, merge.absorbed, merge.merged, merge.similarity, merge.size
                );
            }
        }
    }
    println!(
        "   {} words | {} merges | cache hit rate {:.1}% | duration {:.2?}",
        metrics.words,
        metrics.merges,
        metrics.hit_rate() * 100.0,
        metrics.duration
    );
    Ok(())
}

fn run_score(args: ScoreArgs) -> Result<()> {
    let mut builder = ModelConfig::builder();
    if let Some(floor) = args.floor {
        builder = builder.path_floor(floor);
    }
    let model = load_model(&args.model, builder.build()?)?;
    let lexicon = load_lexicon(args.lexicon.as_deref())?;

    let path = content_tokens(args.phrase.join(" ").as_bytes(), &lexicon);
    let candidates = content_tokens(args.candidates.as_bytes(), &lexicon);
    if path.is_empty() {
        bail!("phrase contains no tokens");
    }
    let probability = model.path_probability(&path, &candidates);
    let mut out = io::stdout().lock();
    writeln!(out, "{probability:.6}")?;
    Ok(())
}

fn content_tokens(text: &[u8], lexicon: &Lexicon) -> Vec<Token> {
    tokenize_line(text, lexicon)
        .into_iter()
        .filter(|token| !token.is_sentinel())
        .collect()
}

fn words(group: &[Token]) -> Vec<String> {
    group.iter().map(ToString::to_string).collect()
}
