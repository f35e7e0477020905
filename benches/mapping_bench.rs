use criterion::{black_box, criterion_group, criterion_main, Criterion};
use seriesrip::{
    map_by_chapters, map_by_title, Chapter, DurationWindow, Episode, FirstSolutionResolver, Title,
};
use std::time::Duration;

fn concatenated_title(episode_count: u32) -> Title {
    let mut title = Title::new(1);
    // Four chapters per episode: 10 + 12 + 11 + 9 minutes
    let pattern = [10u64, 12, 11, 9];
    let mut number = 0;
    for _ in 0..episode_count {
        for minutes in pattern {
            number += 1;
            title
                .chapters
                .push(Chapter::new(number, Duration::from_secs(minutes * 60)));
        }
    }
    title.duration = title.chapters.iter().map(|c| c.duration).sum();
    title
}

fn episodes(count: u32) -> Vec<Episode> {
    (1..=count)
        .map(|n| Episode::new(n, format!("Episode {}", n)))
        .collect()
}

/// Benchmark the chapter partition search on a full-season disc
fn bench_chapter_mapping(c: &mut Criterion) {
    let titles = vec![concatenated_title(6)];
    let episodes = episodes(6);
    let window = DurationWindow::from_minutes(40, 44);

    c.bench_function("chapter_partition_search", |b| {
        b.iter(|| {
            map_by_chapters(
                black_box(&titles),
                black_box(&episodes),
                black_box(&window),
                None,
            )
        })
    });
}

/// Benchmark an ambiguous search that walks many candidate partitions
fn bench_ambiguous_chapter_mapping(c: &mut Criterion) {
    let titles = vec![concatenated_title(6)];
    let episodes = episodes(6);
    // Loose window: many run lengths qualify, the resolver picks one
    let window = DurationWindow::from_minutes(20, 65);

    c.bench_function("chapter_partition_search_ambiguous", |b| {
        b.iter(|| {
            let mut resolver = FirstSolutionResolver;
            map_by_chapters(
                black_box(&titles),
                black_box(&episodes),
                black_box(&window),
                Some(&mut resolver),
            )
        })
    });
}

/// Benchmark title-based mapping over a large candidate list
fn bench_title_mapping(c: &mut Criterion) {
    let titles: Vec<Title> = (1..=100)
        .map(|n| {
            let mut title = Title::new(n);
            title.duration = Duration::from_secs(((n as u64 % 50) + 10) * 60);
            title
        })
        .collect();
    let episodes = episodes(20);
    let window = DurationWindow::from_minutes(40, 45);

    c.bench_function("title_mapping", |b| {
        b.iter(|| map_by_title(black_box(&titles), black_box(&episodes), black_box(&window)))
    });
}

criterion_group!(
    benches,
    bench_chapter_mapping,
    bench_ambiguous_chapter_mapping,
    bench_title_mapping
);
criterion_main!(benches);
