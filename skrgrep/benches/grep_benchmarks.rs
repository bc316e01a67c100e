#![allow(unused_must_use)]

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use skrgrep::encoding::Charset;
use skrgrep::{
    CharsetSetting, GrepRequest, GrepSession, OutputLineType, SearchPattern, SilentProgress,
    StringSink,
};
use std::{fs::File, io::Write, num::NonZeroUsize};
use tempfile::tempdir;

fn create_test_files(
    dir: &tempfile::TempDir,
    file_count: usize,
    lines_per_file: usize,
) -> std::io::Result<()> {
    for i in 0..file_count {
        let file_path = dir.path().join(format!("test_{}.txt", i));
        let mut file = File::create(file_path)?;
        for j in 0..lines_per_file {
            writeln!(
                file,
                "Line {} TODO: fix bug {} FIXME: optimize line {} NOTE: important task {}",
                j, j, j, j
            )?;
        }
    }
    Ok(())
}

fn create_base_request(dir: &tempfile::TempDir, pattern: SearchPattern) -> GrepRequest {
    let mut request = GrepRequest::new(pattern, "*.txt", &dir.path().display().to_string());
    request.options.charset = CharsetSetting::Fixed(Charset::Utf8);
    request.thread_count = NonZeroUsize::new(1).unwrap();
    request
}

fn run(session: &GrepSession, request: &GrepRequest) -> u64 {
    let mut sink = StringSink::new();
    session
        .run(request, &mut SilentProgress::new(), &mut sink)
        .unwrap()
        .hit_count
}

fn bench_repeated_pattern(c: &mut Criterion) -> std::io::Result<()> {
    let dir = tempdir()?;
    create_test_files(&dir, 1, 10)?;
    let session = GrepSession::new();

    let patterns = vec![
        SearchPattern::new("TODO"),
        SearchPattern::new(r"TODO:.*\d+").regex(true),
        SearchPattern::new(r"FIXME:.*bug.*line \d+").regex(true),
        SearchPattern::new("important").word_only(true),
    ];

    let mut group = c.benchmark_group("Repeated Pattern");
    for (i, pattern) in patterns.into_iter().enumerate() {
        let request = create_base_request(&dir, pattern);
        group.bench_function(format!("pattern_{}", i), |b| {
            b.iter(|| black_box(run(&session, &request)));
        });
    }
    group.finish();
    Ok(())
}

fn bench_file_scaling(c: &mut Criterion) -> std::io::Result<()> {
    let dir = tempdir()?;
    let session = GrepSession::new();
    let request = create_base_request(&dir, SearchPattern::new("TODO"));

    let mut group = c.benchmark_group("File Scaling");
    for count in [1, 10, 100, 1000] {
        create_test_files(&dir, count, 10)?;
        group.bench_function(format!("files_{}", count), |b| {
            b.iter(|| black_box(run(&session, &request)));
        });
    }
    group.finish();
    Ok(())
}

fn bench_thread_scaling(c: &mut Criterion) -> std::io::Result<()> {
    let dir = tempdir()?;
    create_test_files(&dir, 200, 50)?;
    let session = GrepSession::new();

    let mut group = c.benchmark_group("Thread Scaling");
    for threads in [1, 2, 4, 8] {
        let mut request = create_base_request(&dir, SearchPattern::new("FIXME"));
        request.thread_count = NonZeroUsize::new(threads).unwrap();
        group.bench_function(format!("threads_{}", threads), |b| {
            b.iter(|| black_box(run(&session, &request)));
        });
    }
    group.finish();
    Ok(())
}

fn bench_output_modes(c: &mut Criterion) -> std::io::Result<()> {
    let dir = tempdir()?;
    create_test_files(&dir, 50, 100)?;
    let session = GrepSession::new();

    let mut group = c.benchmark_group("Output Modes");
    for (name, line_type) in [
        ("matched_text", OutputLineType::Match),
        ("matched_lines", OutputLineType::Line),
        ("unmatched_lines", OutputLineType::NotMatched),
    ] {
        let mut request = create_base_request(&dir, SearchPattern::new("task 7"));
        request.options.line_type = line_type;
        group.bench_function(name, |b| {
            b.iter(|| black_box(run(&session, &request)));
        });
    }

    let mut detect = create_base_request(&dir, SearchPattern::new("TODO"));
    detect.options.charset = CharsetSetting::Auto;
    group.bench_function("charset_detection", |b| {
        b.iter(|| black_box(run(&session, &detect)));
    });
    group.finish();
    Ok(())
}

fn bench_replace(c: &mut Criterion) -> std::io::Result<()> {
    let dir = tempdir()?;
    let session = GrepSession::new();
    let mut request = create_base_request(&dir, SearchPattern::new("TODO"));
    request.options.replace = true;
    request.replace_text = Some("DONE".to_string());

    let mut group = c.benchmark_group("Replace");
    group.bench_function("replace_20_files", |b| {
        b.iter_batched(
            || create_test_files(&dir, 20, 50).unwrap(),
            |_| black_box(run(&session, &request)),
            BatchSize::SmallInput,
        );
    });
    group.finish();
    Ok(())
}

criterion_group! {
    name = benches;
    config = Criterion::default();
    targets = bench_repeated_pattern, bench_file_scaling,
              bench_thread_scaling, bench_output_modes, bench_replace
}

criterion_main!(benches);
