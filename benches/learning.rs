use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, SamplingMode, Throughput};
use wordweave::{cluster, ClusterConfig, Lexicon, ModelConfig, WordModel};

const SUBJECTS: [&str; 8] = [
    "the cat",
    "a dog",
    "my friend",
    "the river",
    "an old man",
    "she",
    "we",
    "they",
];
const VERBS: [&str; 6] = ["sees", "finds", "remembers", "follows", "keeps", "loves"];
const OBJECTS: [&str; 7] = [
    "the house.",
    "a red apple!",
    "3.5 miles,",
    "(the song)",
    "the light?",
    "every morning.",
    "the sea, again.",
];

fn build_lines(count: usize) -> Vec<String> {
    (0..count)
        .map(|idx| {
            format!(
                "{} {} {}",
                SUBJECTS[idx % SUBJECTS.len()],
                VERBS[(idx / 3) % VERBS.len()],
                OBJECTS[(idx / 7) % OBJECTS.len()]
            )
        })
        .collect()
}

fn trained_model(lines: &[String]) -> WordModel {
    let cfg = ModelConfig::builder()
        .seed(Some(7))
        .build()
        .expect("configuration");
    let mut model = WordModel::new(cfg).expect("model");
    model.learn_lines(lines, &Lexicon::default());
    model
}

fn bench_learning(c: &mut Criterion) {
    let lines = build_lines(4096);
    let total_bytes: usize = lines.iter().map(String::len).sum();
    let lexicon = Lexicon::default();

    let mut group = c.benchmark_group("learn_lines");
    group.throughput(Throughput::Bytes(total_bytes as u64));
    group.sampling_mode(SamplingMode::Flat);
    group.bench_function(BenchmarkId::from_parameter("lines_4096"), |b| {
        b.iter(|| {
            let mut model = WordModel::new(ModelConfig::default()).expect("model");
            let learned = model.learn_lines(&lines, &lexicon);
            black_box(learned);
        });
    });
    group.finish();
}

fn bench_generation(c: &mut Criterion) {
    let mut model = trained_model(&build_lines(4096));
    c.bench_function("think_line", |b| {
        b.iter(|| black_box(model.think_line().expect("generation")));
    });
}

fn bench_clustering(c: &mut Criterion) {
    let model = trained_model(&build_lines(1024));
    let cfg = ClusterConfig::default();

    let mut group = c.benchmark_group("cluster_vocabulary");
    group.sample_size(10);
    group.bench_function(BenchmarkId::from_parameter("lines_1024"), |b| {
        b.iter(|| {
            let result = cluster(model.graph(), &cfg).expect("clustering");
            black_box(result);
        });
    });
    group.finish();
}

criterion_group!(benches, bench_learning, bench_generation, bench_clustering);
criterion_main!(benches);
