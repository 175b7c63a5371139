//! End-to-end runs over small corpora written to temporary directories.

use keprep_core::{
    npy, run, run_with_progress, Corpus, CorpusPaths, EmitterConfig, Error, Progress, SamplingMode,
    Split, Stream,
};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

struct Fixture {
    dir: TempDir,
    paths: CorpusPaths,
}

fn fixture(
    train: &str,
    valid: &str,
    test: &str,
    num_entities: usize,
    context: Option<&str>,
) -> Fixture {
    let dir = TempDir::new().unwrap();
    let write = |name: &str, content: &str| -> PathBuf {
        let p = dir.path().join(name);
        fs::write(&p, content).unwrap();
        p
    };
    let desc: String = (0..num_entities)
        .map(|i| format!("desc of entity {i}\n"))
        .collect();

    let paths = CorpusPaths {
        train: write("train.txt", train),
        valid: write("valid.txt", valid),
        test: write("test.txt", test),
        descriptions: write("desc.bpe", &desc),
        context: context.map(|c| write("contexts.json", c)),
    };
    Fixture { dir, paths }
}

fn line_count(path: &Path) -> usize {
    fs::read_to_string(path).unwrap().lines().count()
}

fn read_dump(root: &Path) -> Vec<(PathBuf, Vec<u8>)> {
    let mut files = Vec::new();
    for stream in ["head", "tail", "negHead", "negTail", "relation", "sizes"] {
        for entry in fs::read_dir(root.join(stream)).unwrap() {
            let p = entry.unwrap().path();
            let bytes = fs::read(&p).unwrap();
            files.push((p.strip_prefix(root).unwrap().to_path_buf(), bytes));
        }
    }
    files.push((PathBuf::from("count.json"), fs::read(root.join("count.json")).unwrap()));
    files.sort();
    files
}

fn chain_graph(n: usize) -> String {
    (0..n).map(|i| format!("{} {} {}\n", i, i % 3, (i + 1) % n)).collect()
}

#[test]
fn test_streams_are_aligned() {
    let k = 2;
    let f = fixture(&chain_graph(40), "3 1 9\n", "5 2 30\n", 40, None);
    let corpus = Corpus::load(&f.paths).unwrap();
    let dump = f.dir.path().join("dump");

    let config = EmitterConfig::default().with_negative_sampling_size(k);
    let reports = run(&corpus, &dump, &config).unwrap();
    assert_eq!(reports.len(), 3);

    for report in &reports {
        let split = report.split;
        let emitted = line_count(&dump.join("head").join(format!("{split}.bpe")));
        assert_eq!(emitted, report.emitted);
        assert_eq!(line_count(&dump.join("tail").join(format!("{split}.bpe"))), emitted);
        assert_eq!(line_count(&dump.join("negHead").join(format!("{split}.bpe"))), k * emitted);
        assert_eq!(line_count(&dump.join("negTail").join(format!("{split}.bpe"))), k * emitted);

        let relations = npy::read_i64(dump.join("relation").join(format!("{split}.npy"))).unwrap();
        let sizes = npy::read_i64(dump.join("sizes").join(format!("{split}.npy"))).unwrap();
        assert_eq!(relations.len(), emitted);
        assert_eq!(sizes.len(), emitted);
        // Every description has 4 tokens: head + tail + 2k negatives.
        assert!(sizes.iter().all(|&s| s == 4 * (2 + 2 * k as i64)));
    }

    // Vocabulary of 40 leaves plenty of candidates.
    assert_eq!(reports[0].emitted, 40);
    assert_eq!(reports[1].emitted, 1);
}

#[test]
fn test_count_json() {
    let f = fixture("0 0 1\n", "", "", 2, None);
    let corpus = Corpus::load(&f.paths).unwrap();
    let dump = f.dir.path().join("dump");
    run(&corpus, &dump, &EmitterConfig::default()).unwrap();

    let count: serde_json::Value =
        serde_json::from_slice(&fs::read(dump.join("count.json")).unwrap()).unwrap();
    assert_eq!(count["0,0"], 4);
    assert_eq!(count["1,-1"], 4);
}

#[test]
fn test_scenario_global_filters_true_tails() {
    let f = fixture("0 0 1\n1 0 2\n", "", "", 4, None);
    let corpus = Corpus::load(&f.paths).unwrap();

    for seed in 0..10 {
        let dump = f.dir.path().join(format!("dump-{seed}"));
        let config = EmitterConfig::default()
            .with_mode(SamplingMode::Global)
            .with_seed(seed);
        let reports = run(&corpus, &dump, &config).unwrap();
        assert_eq!(reports[0].emitted, 2);

        let neg_tails = fs::read_to_string(dump.join("negTail").join("train.bpe")).unwrap();
        let lines: Vec<&str> = neg_tails.lines().collect();
        assert_ne!(lines[0], "desc of entity 1");
        assert_ne!(lines[1], "desc of entity 2");
    }
}

#[test]
fn test_local_sampling_with_context_corpus() {
    // Documents: contexts {0, 1, 2} cite {3, 4, 5}.
    let context = r#"[
        {"paper_contexts": [0, 1, 2], "citations": [3, 4, 5]},
        {"paper_contexts": [6], "citations": [7]}
    ]"#;
    // (6, 0, 7): only candidate head is 6, only candidate tail is 7. Dropped.
    let f = fixture("0 0 3\n1 0 4\n6 0 7\n", "", "", 8, Some(context));
    let corpus = Corpus::load(&f.paths).unwrap();
    let dump = f.dir.path().join("dump");

    let reports = run(&corpus, &dump, &EmitterConfig::default()).unwrap();
    let train = &reports[0];
    assert_eq!(train.processed, 3);
    assert_eq!(train.emitted, 2);
    assert_eq!(train.stats.head.missing, 1);
    assert_eq!(train.stats.tail.missing, 1);

    let neg_heads = fs::read_to_string(dump.join("negHead").join("train.bpe")).unwrap();
    for line in neg_heads.lines() {
        let id: usize = line.rsplit(' ').next().unwrap().parse().unwrap();
        assert!(id <= 2, "negative head {id} outside the citing documents");
    }
    let relations = npy::read_i64(dump.join("relation").join("train.npy")).unwrap();
    assert_eq!(relations, vec![0, 0]);
}

#[test]
fn test_output_is_deterministic_across_runs_and_threads() {
    let context = r#"[{
        "paper_contexts": [0, 1, 2, 3, 4, 5, 6, 7, 8, 9],
        "citations": [10, 11, 12, 13, 14, 15, 16, 17, 18, 19]
    }]"#;
    let train: String = (0..200)
        .map(|i| format!("{} {} {}\n", i % 10, i % 4, 10 + (i * 3) % 10))
        .collect();
    let f = fixture(&train, "1 0 12\n", "2 1 13\n", 20, Some(context));
    let corpus = Corpus::load(&f.paths).unwrap();

    let a = f.dir.path().join("a");
    let b = f.dir.path().join("b");
    let c = f.dir.path().join("c");
    let config = EmitterConfig::default().with_negative_sampling_size(2);
    run(&corpus, &a, &config.clone().with_threads(1)).unwrap();
    run(&corpus, &b, &config.clone().with_threads(1)).unwrap();
    run(&corpus, &c, &config.with_threads(3)).unwrap();

    assert_eq!(read_dump(&a), read_dump(&b));
    assert_eq!(read_dump(&a), read_dump(&c));
}

#[test]
fn test_existing_dump_is_rejected() {
    let f = fixture("0 0 1\n", "", "", 3, None);
    let corpus = Corpus::load(&f.paths).unwrap();
    let dump = f.dir.path().join("dump");
    fs::create_dir(&dump).unwrap();

    let err = run(&corpus, &dump, &EmitterConfig::default()).unwrap_err();
    assert!(matches!(err, Error::DumpExists(_)));
    assert!(!dump.join("head").exists());
}

#[test]
fn test_malformed_triplet_is_fatal() {
    let f = fixture("0 0 1\n0 0\n", "", "", 3, None);
    assert!(matches!(
        Corpus::load(&f.paths),
        Err(Error::ParseTriplet { line: 2, .. })
    ));
}

#[test]
fn test_malformed_context_is_fatal() {
    for context in ["not json", r#"[{"paper_contexts": ["a"], "citations": [1]}]"#] {
        let f = fixture("0 0 1\n", "", "", 3, Some(context));
        let err = Corpus::load(&f.paths).unwrap_err();
        assert!(matches!(err, Error::Json(_)), "unexpected error: {err}");
        assert!(!f.dir.path().join("dump").exists());
    }
}

#[test]
fn test_negative_relation_is_fatal() {
    let f = fixture("0 0 1\n", "1 -1 2\n", "", 3, None);
    assert!(matches!(
        Corpus::load(&f.paths),
        Err(Error::ParseTriplet { line: 1, .. })
    ));
}

#[test]
fn test_progress_events_follow_the_pass() {
    let f = fixture(&chain_graph(12), "3 1 9\n", "5 2 7\n", 12, None);
    let corpus = Corpus::load(&f.paths).unwrap();
    let dump = f.dir.path().join("dump");

    let mut events = Vec::new();
    let reports = run_with_progress(&corpus, &dump, &EmitterConfig::default(), |p| {
        events.push(match p {
            Progress::Prepared { dump, keys } => {
                assert!(dump.count_path().is_file());
                format!("prepared {keys}")
            }
            Progress::SplitStarted { split, triplets } => format!("start {split} {triplets}"),
            Progress::SplitFinished(report) => format!("finish {}", report.split),
        })
    })
    .unwrap();

    assert_eq!(reports.len(), 3);
    assert_eq!(events[0], format!("prepared {}", corpus.store.frequency(4).len()));
    assert_eq!(
        &events[1..],
        [
            "start train 12",
            "finish train",
            "start valid 1",
            "finish valid",
            "start test 1",
            "finish test",
        ]
    );
}

#[test]
fn test_dump_paths() {
    let dir = TempDir::new().unwrap();
    let dump = keprep_core::DumpDir::create(dir.path().join("out")).unwrap();
    assert_eq!(
        dump.path(Stream::NegHead, Split::Valid),
        dir.path().join("out").join("negHead").join("valid.bpe")
    );
    assert_eq!(
        dump.path(Stream::Sizes, Split::Test),
        dir.path().join("out").join("sizes").join("test.npy")
    );
}
