use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use logsift::export::ExportEngine;
use logsift::search::{AnnotationTable, SearchEngine, SearchRegistry};
use logsift::{CancellationToken, EngineConfig, LineStore, SearchCriteria, SearchType};
use std::io::Write;
use std::time::Duration;
use tempfile::{NamedTempFile, TempDir};

fn create_log_file(size_kb: usize, pattern_frequency: usize) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
    let target_size = size_kb * 1024;
    let mut current_size = 0;
    let mut line_num = 0;

    let log_levels = ["DEBUG", "INFO", "WARN", "ERROR"];
    let services = ["auth", "database", "cache", "payment"];

    while current_size < target_size {
        let log_level = log_levels[line_num % log_levels.len()];
        let service = services[line_num % services.len()];

        let log_line = if line_num % pattern_frequency == 0 {
            format!(
                "[2024-09-02T10:{:02}:{:02}] {} {}: Request {} failed with timeout user_{}\r\n",
                (line_num / 60) % 60,
                line_num % 60,
                log_level,
                service,
                line_num,
                line_num % 1000
            )
        } else {
            format!(
                "[2024-09-02T10:{:02}:{:02}] {} {}: Request {} processed successfully user_{}\n",
                (line_num / 60) % 60,
                line_num % 60,
                log_level,
                service,
                line_num,
                line_num % 1000
            )
        };

        temp_file.write_all(log_line.as_bytes()).unwrap();
        current_size += log_line.len();
        line_num += 1;
    }

    temp_file.flush().unwrap();
    temp_file
}

fn load(path: &std::path::Path) -> LineStore {
    LineStore::load(path, &CancellationToken::new(), &EngineConfig::default(), |_| {})
        .unwrap()
        .store
}

fn bench_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("load");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(5));

    for size_kb in [1_024, 16_384] {
        let file = create_log_file(size_kb, 100);
        group.throughput(Throughput::Bytes((size_kb * 1024) as u64));
        group.bench_with_input(
            BenchmarkId::new("index", format!("{}MB", size_kb / 1024)),
            &file,
            |b, file| b.iter(|| black_box(load(file.path()).line_count())),
        );
    }

    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("search");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(5));

    let file = create_log_file(16_384, 100);
    let store = load(file.path());
    let prior = AnnotationTable::new(store.line_count(), 0);
    let engine = SearchEngine::default();
    let token = CancellationToken::new();
    group.throughput(Throughput::Bytes(store.file_size()));

    let mut registry = SearchRegistry::new();
    let terms = [
        ("plain", SearchType::PlainText, "timeout"),
        ("wildcard", SearchType::Wildcard, "failed*user_9?"),
        ("regex", SearchType::Regex, r"Request \d+ failed"),
    ];
    let mut matchers = Vec::new();

    for (label, search_type, pattern) in terms {
        let id = registry.add(SearchCriteria::new(search_type, pattern), true);
        let matcher = registry.get(id).unwrap().compile().unwrap();

        group.bench_function(BenchmarkId::new("single", label), |b| {
            b.iter(|| {
                let run = engine
                    .search(&store, &prior, &matcher, false, &token, 2)
                    .unwrap();
                black_box(run.summary.matches)
            })
        });
        matchers.push(matcher);
    }

    group.bench_function("multi_three_terms", |b| {
        b.iter(|| {
            let run = engine
                .search_multi(&store, &prior, &matchers, &token, 2)
                .unwrap();
            black_box(run.summary.matches)
        })
    });

    group.finish();
}

fn bench_random_access(c: &mut Criterion) {
    let file = create_log_file(16_384, 100);
    let store = load(file.path());
    let line_count = store.line_count();

    c.bench_function("get_line_scattered", |b| {
        let mut line = 0u64;
        b.iter(|| {
            line = (line + 7_919) % line_count;
            black_box(store.get_line(line).unwrap())
        })
    });
}

fn bench_export(c: &mut Criterion) {
    let mut group = c.benchmark_group("export");
    group.sample_size(10);

    let file = create_log_file(16_384, 100);
    let store = load(file.path());
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("export.log");
    let engine = ExportEngine::default();
    let token = CancellationToken::new();
    group.throughput(Throughput::Bytes(store.file_size()));

    group.bench_function("all", |b| {
        b.iter(|| black_box(engine.export_all(&store, &out, &token).lines_written))
    });

    let every_tenth: Vec<u64> = (0..store.line_count()).step_by(10).collect();
    group.bench_function("every_tenth_line", |b| {
        b.iter(|| {
            black_box(
                engine
                    .export_subset(&store, &every_tenth, &out, &token)
                    .lines_written,
            )
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_load,
    bench_search,
    bench_random_access,
    bench_export
);
criterion_main!(benches);
