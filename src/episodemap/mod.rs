/// Episode mapping module
///
/// Maps the titles and chapters of a scanned disc onto the episodes of a
/// season by duration. Whole titles that fit the expected duration window
/// map one to one; when several episodes are concatenated into a single
/// long title, a partition search splits its chapter sequence into
/// contiguous runs, one per episode.
mod search;

use crate::database::Episode;
use crate::scan::{Chapter, Title};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Result type for mapping operations
pub type Result<T> = std::result::Result<T, MapError>;

/// Error types for mapping operations
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MapError {
    #[error("invalid duration window: minimum {min:?} exceeds maximum {max:?}")]
    InvalidWindow { min: Duration, max: Duration },

    #[error("no candidate titles supplied")]
    NoTitles,

    #[error("no unassigned episodes supplied")]
    NoEpisodes,

    #[error("title {0} has no usable chapters")]
    NoChapters(u32),

    #[error("no chapter mappings found")]
    NoSolutions,

    #[error("{0} chapter mappings found and none was selected")]
    MultipleSolutions(usize),
}

/// Inclusive duration window an episode is expected to fall into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationWindow {
    pub min: Duration,
    pub max: Duration,
}

impl DurationWindow {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    pub fn from_minutes(min: u64, max: u64) -> Self {
        Self::new(Duration::from_secs(min * 60), Duration::from_secs(max * 60))
    }

    /// Whether a duration lies inside the window, bounds included
    pub fn contains(&self, duration: Duration) -> bool {
        self.min <= duration && duration <= self.max
    }

    /// Fail fast on an inverted window
    pub fn validate(&self) -> Result<()> {
        if self.min > self.max {
            return Err(MapError::InvalidWindow {
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }
}

/// Where a mapped episode's content comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MapTarget {
    /// A whole title corresponds to the episode
    Title(u32),
    /// A contiguous chapter range [first, last] within a title
    Chapters { title: u32, first: u32, last: u32 },
}

impl fmt::Display for MapTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapTarget::Title(number) => write!(f, "title {}", number),
            MapTarget::Chapters { title, first, last } => {
                write!(f, "title {} chapters {}-{}", title, first, last)
            }
        }
    }
}

/// A computed mapping of episodes to disc content
///
/// Iteration always yields episodes in ascending number order, independent
/// of insertion order. Each successful mapping computation returns a fresh
/// map; nothing mutates one after it is returned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EpisodeMap {
    entries: BTreeMap<Episode, MapTarget>,
}

impl EpisodeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, episode: Episode, target: MapTarget) {
        self.entries.insert(episode, target);
    }

    pub fn get(&self, episode: &Episode) -> Option<&MapTarget> {
        self.entries.get(episode)
    }

    /// Entries in ascending episode number order
    pub fn iter(&self) -> impl Iterator<Item = (&Episode, &MapTarget)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IntoIterator for EpisodeMap {
    type Item = (Episode, MapTarget);
    type IntoIter = std::collections::btree_map::IntoIter<Episode, MapTarget>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// One episode's share of a candidate solution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateEntry {
    pub episode: Episode,
    pub first: u32,
    pub last: u32,
    pub duration: Duration,
}

impl fmt::Display for CandidateEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Episode {} = Chapters {}-{} ({})",
            self.episode.number,
            self.first,
            self.last,
            format_duration(self.duration)
        )
    }
}

/// One complete candidate partition, rendered for presentation to a resolver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub entries: Vec<CandidateEntry>,
}

impl Candidate {
    fn render(episodes: &[Episode], chapters: &[Chapter], runs: &[usize]) -> Self {
        let entries = episodes
            .iter()
            .zip(search::partition(chapters, runs))
            .filter_map(|(episode, group)| {
                let first = group.first()?;
                let last = group.last()?;
                Some(CandidateEntry {
                    episode: episode.clone(),
                    first: first.number,
                    last: last.number,
                    duration: group.iter().map(|c| c.duration).sum(),
                })
            })
            .collect();
        Self { entries }
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", entry)?;
        }
        Ok(())
    }
}

/// Chooses among several valid partitions
///
/// The resolver returns a 1-based index into the candidate list, or `None`
/// to decline. Keeping an interactive operator honest (re-prompting on
/// garbage input) is the resolver's job; the mapping core accepts exactly
/// one validated answer.
pub trait SolutionResolver {
    fn resolve(&mut self, candidates: &[Candidate]) -> Option<usize>;
}

impl<F> SolutionResolver for F
where
    F: FnMut(&[Candidate]) -> Option<usize>,
{
    fn resolve(&mut self, candidates: &[Candidate]) -> Option<usize> {
        self(candidates)
    }
}

/// A resolver that always picks the first candidate
pub struct FirstSolutionResolver;

impl SolutionResolver for FirstSolutionResolver {
    fn resolve(&mut self, _candidates: &[Candidate]) -> Option<usize> {
        Some(1)
    }
}

/// Options for the chapter-partition mapper
#[derive(Debug, Clone, Copy)]
pub struct ChapterMapOptions {
    /// Drop zero-duration chapters from the end of the source title before
    /// searching. Such chapters carry no content but would be absorbed into
    /// the last episode's chapter range.
    pub strip_trailing_empty: bool,
}

impl Default for ChapterMapOptions {
    fn default() -> Self {
        Self {
            strip_trailing_empty: true,
        }
    }
}

/// Map whole titles onto episodes by duration
///
/// Walks the candidate titles in order and pairs each one whose duration
/// lies in the window with the next unmapped episode. Titles outside the
/// window are skipped and reported. The result may cover fewer episodes
/// than requested; detecting the shortfall is the caller's responsibility.
pub fn map_by_title(titles: &[Title], episodes: &[Episode], window: &DurationWindow) -> EpisodeMap {
    if window.min > window.max {
        warn!(
            "Duration window {:?}-{:?} is inverted; no title can match",
            window.min, window.max
        );
        return EpisodeMap::new();
    }
    let mut map = EpisodeMap::new();
    let mut remaining = episodes.iter();
    for title in titles {
        if map.len() == episodes.len() {
            break;
        }
        if window.contains(title.duration) {
            if let Some(episode) = remaining.next() {
                map.insert(episode.clone(), MapTarget::Title(title.number));
            }
        } else {
            debug!(
                "Title {} is not an episode (duration: {})",
                title.number,
                format_duration(title.duration)
            );
        }
    }
    map
}

/// Map the chapters of the longest candidate title onto episodes
pub fn map_by_chapters(
    titles: &[Title],
    episodes: &[Episode],
    window: &DurationWindow,
    resolver: Option<&mut dyn SolutionResolver>,
) -> Result<EpisodeMap> {
    map_by_chapters_with(titles, episodes, window, resolver, ChapterMapOptions::default())
}

/// Map chapters onto episodes with explicit options
///
/// The longest candidate title is assumed to hold every target episode
/// back to back. Its chapter sequence is partitioned into contiguous runs,
/// one per episode, each run's total duration inside the window. Zero
/// solutions fail with [`MapError::NoSolutions`]; a unique solution is
/// adopted; several solutions are offered to the resolver and fail with
/// [`MapError::MultipleSolutions`] when no valid choice is made.
pub fn map_by_chapters_with(
    titles: &[Title],
    episodes: &[Episode],
    window: &DurationWindow,
    resolver: Option<&mut dyn SolutionResolver>,
    options: ChapterMapOptions,
) -> Result<EpisodeMap> {
    window.validate()?;
    if episodes.is_empty() {
        return Err(MapError::NoEpisodes);
    }
    let source = titles
        .iter()
        .max_by_key(|t| t.duration)
        .ok_or(MapError::NoTitles)?;
    debug!(
        "Longest title is {} (duration: {}), containing {} chapters",
        source.number,
        format_duration(source.duration),
        source.chapters.len()
    );

    let mut chapters: &[Chapter] = &source.chapters;
    if options.strip_trailing_empty {
        while chapters.last().map_or(false, |c| c.duration == Duration::ZERO) {
            chapters = &chapters[..chapters.len() - 1];
        }
        if chapters.len() < source.chapters.len() {
            debug!(
                "Ignoring {} trailing empty chapter(s) of title {}",
                source.chapters.len() - chapters.len(),
                source.number
            );
        }
    }
    if chapters.is_empty() {
        return Err(MapError::NoChapters(source.number));
    }

    let solutions = search::solutions(chapters, episodes.len(), window);
    let chosen = match solutions.len() {
        0 => return Err(MapError::NoSolutions),
        1 => &solutions[0],
        count => {
            info!("Found {} potential chapter mappings", count);
            let candidates: Vec<Candidate> = solutions
                .iter()
                .map(|runs| Candidate::render(episodes, chapters, runs))
                .collect();
            match resolver.and_then(|r| r.resolve(&candidates)) {
                Some(index) if (1..=count).contains(&index) => &solutions[index - 1],
                Some(index) => {
                    warn!("Resolver chose {} outside 1-{}", index, count);
                    return Err(MapError::MultipleSolutions(count));
                }
                None => return Err(MapError::MultipleSolutions(count)),
            }
        }
    };

    let mut map = EpisodeMap::new();
    for (episode, group) in episodes.iter().zip(search::partition(chapters, chosen)) {
        if let (Some(first), Some(last)) = (group.first(), group.last()) {
            map.insert(
                episode.clone(),
                MapTarget::Chapters {
                    title: source.number,
                    first: first.number,
                    last: last.number,
                },
            );
        }
    }
    Ok(map)
}

/// Map a disc onto episodes, preferring whole titles
///
/// Runs the title-based mapper first; when it cannot cover every episode,
/// falls back to the chapter partition search.
pub fn automap(
    titles: &[Title],
    episodes: &[Episode],
    window: &DurationWindow,
    resolver: Option<&mut dyn SolutionResolver>,
    options: ChapterMapOptions,
) -> Result<EpisodeMap> {
    let by_title = map_by_title(titles, episodes, window);
    if !episodes.is_empty() && by_title.len() == episodes.len() {
        return Ok(by_title);
    }
    debug!(
        "Title mapping covered {}/{} episodes, trying chapter mapping",
        by_title.len(),
        episodes.len()
    );
    map_by_chapters_with(titles, episodes, window, resolver, options)
}

/// Render a duration as `HH:MM:SS`
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    format!("{:02}:{:02}:{:02}", total / 3600, (total / 60) % 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minutes(m: u64) -> Duration {
        Duration::from_secs(m * 60)
    }

    fn title_with_chapters(number: u32, durations: &[u64]) -> Title {
        let mut title = Title::new(number);
        for (i, m) in durations.iter().enumerate() {
            title.chapters.push(Chapter::new(i as u32 + 1, minutes(*m)));
        }
        title.duration = title.chapters.iter().map(|c| c.duration).sum();
        title
    }

    fn plain_title(number: u32, duration_minutes: u64) -> Title {
        let mut title = Title::new(number);
        title.duration = minutes(duration_minutes);
        title
    }

    fn episodes(count: u32) -> Vec<Episode> {
        (1..=count)
            .map(|n| Episode::new(n, format!("Episode {}", n)))
            .collect()
    }

    #[test]
    fn test_unique_chapter_solution() {
        let titles = vec![title_with_chapters(1, &[10, 10, 11, 9])];
        let episodes = episodes(2);
        let map = map_by_chapters(&titles, &episodes, &DurationWindow::from_minutes(18, 22), None)
            .unwrap();

        assert_eq!(
            map.get(&episodes[0]),
            Some(&MapTarget::Chapters { title: 1, first: 1, last: 2 })
        );
        assert_eq!(
            map.get(&episodes[1]),
            Some(&MapTarget::Chapters { title: 1, first: 3, last: 4 })
        );
    }

    #[test]
    fn test_ambiguous_without_resolver() {
        let titles = vec![title_with_chapters(1, &[10, 10, 10, 10])];
        let result = map_by_chapters(&titles, &episodes(2), &DurationWindow::from_minutes(9, 31), None);
        assert_eq!(result, Err(MapError::MultipleSolutions(3)));
    }

    #[test]
    fn test_resolver_selects_candidate() {
        let titles = vec![title_with_chapters(1, &[10, 10, 10, 10])];
        let episodes = episodes(2);
        let mut pick_second = |candidates: &[Candidate]| {
            assert_eq!(candidates.len(), 3);
            // Candidates arrive in discovery order: [1,3], [2,2], [3,1]
            assert_eq!(candidates[0].entries[0].last, 1);
            assert_eq!(candidates[1].entries[0].duration, minutes(20));
            Some(2)
        };
        let map = map_by_chapters(
            &titles,
            &episodes,
            &DurationWindow::from_minutes(9, 31),
            Some(&mut pick_second),
        )
        .unwrap();

        assert_eq!(
            map.get(&episodes[0]),
            Some(&MapTarget::Chapters { title: 1, first: 1, last: 2 })
        );
        assert_eq!(
            map.get(&episodes[1]),
            Some(&MapTarget::Chapters { title: 1, first: 3, last: 4 })
        );
    }

    #[test]
    fn test_no_solutions() {
        let titles = vec![title_with_chapters(1, &[5, 5])];
        let result = map_by_chapters(&titles, &episodes(1), &DurationWindow::from_minutes(20, 30), None);
        assert_eq!(result, Err(MapError::NoSolutions));
    }

    #[test]
    fn test_resolver_out_of_range_index_rejected() {
        let titles = vec![title_with_chapters(1, &[10, 10, 10, 10])];
        let mut too_big = |_: &[Candidate]| Some(4);
        let result = map_by_chapters(
            &titles,
            &episodes(2),
            &DurationWindow::from_minutes(9, 31),
            Some(&mut too_big),
        );
        assert_eq!(result, Err(MapError::MultipleSolutions(3)));
    }

    #[test]
    fn test_resolver_decline_rejected() {
        let titles = vec![title_with_chapters(1, &[10, 10, 10, 10])];
        let mut decline = |_: &[Candidate]| None;
        let result = map_by_chapters(
            &titles,
            &episodes(2),
            &DurationWindow::from_minutes(9, 31),
            Some(&mut decline),
        );
        assert_eq!(result, Err(MapError::MultipleSolutions(3)));
    }

    #[test]
    fn test_first_solution_resolver() {
        let titles = vec![title_with_chapters(1, &[10, 10, 10, 10])];
        let episodes = episodes(2);
        let mut resolver = FirstSolutionResolver;
        let map = map_by_chapters(
            &titles,
            &episodes,
            &DurationWindow::from_minutes(9, 31),
            Some(&mut resolver),
        )
        .unwrap();
        // First discovered solution is [1, 3]
        assert_eq!(
            map.get(&episodes[0]),
            Some(&MapTarget::Chapters { title: 1, first: 1, last: 1 })
        );
    }

    #[test]
    fn test_longest_title_is_searched() {
        let titles = vec![
            plain_title(1, 5),
            title_with_chapters(2, &[10, 10, 11, 9]),
            plain_title(3, 12),
        ];
        let episodes = episodes(2);
        let map = map_by_chapters(&titles, &episodes, &DurationWindow::from_minutes(18, 22), None)
            .unwrap();
        assert_eq!(
            map.get(&episodes[0]),
            Some(&MapTarget::Chapters { title: 2, first: 1, last: 2 })
        );
    }

    #[test]
    fn test_trailing_empty_chapters_stripped() {
        let titles = vec![title_with_chapters(1, &[10, 10, 11, 9, 0])];
        let episodes = episodes(2);
        let window = DurationWindow::from_minutes(18, 22);

        // Stripped by default: the zero-length tail chapter carries nothing
        let map = map_by_chapters(&titles, &episodes, &window, None).unwrap();
        assert_eq!(
            map.get(&episodes[1]),
            Some(&MapTarget::Chapters { title: 1, first: 3, last: 4 })
        );

        // Kept, it is absorbed into the last episode's range
        let kept = map_by_chapters_with(
            &titles,
            &episodes,
            &window,
            None,
            ChapterMapOptions { strip_trailing_empty: false },
        )
        .unwrap();
        assert_eq!(
            kept.get(&episodes[1]),
            Some(&MapTarget::Chapters { title: 1, first: 3, last: 5 })
        );
    }

    #[test]
    fn test_invalid_window_fails_fast() {
        let titles = vec![title_with_chapters(1, &[10, 10])];
        let result = map_by_chapters(&titles, &episodes(1), &DurationWindow::from_minutes(30, 20), None);
        assert!(matches!(result, Err(MapError::InvalidWindow { .. })));
    }

    #[test]
    fn test_missing_inputs_fail_fast() {
        let window = DurationWindow::from_minutes(18, 22);
        assert_eq!(
            map_by_chapters(&[], &episodes(1), &window, None),
            Err(MapError::NoTitles)
        );
        assert_eq!(
            map_by_chapters(&[title_with_chapters(1, &[20])], &[], &window, None),
            Err(MapError::NoEpisodes)
        );
        assert_eq!(
            map_by_chapters(&[plain_title(1, 40)], &episodes(1), &window, None),
            Err(MapError::NoChapters(1))
        );
    }

    #[test]
    fn test_map_by_title_pairs_in_order() {
        let titles = vec![
            plain_title(1, 15),
            plain_title(2, 42),
            plain_title(3, 41),
            plain_title(4, 8),
        ];
        let episodes = episodes(2);
        let map = map_by_title(&titles, &episodes, &DurationWindow::from_minutes(40, 45));

        assert_eq!(map.len(), 2);
        assert_eq!(map.get(&episodes[0]), Some(&MapTarget::Title(2)));
        assert_eq!(map.get(&episodes[1]), Some(&MapTarget::Title(3)));
    }

    #[test]
    fn test_map_by_title_partial_when_candidates_short() {
        let titles = vec![plain_title(1, 42), plain_title(2, 90)];
        let episodes = episodes(2);
        let map = map_by_title(&titles, &episodes, &DurationWindow::from_minutes(40, 45));
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&episodes[0]), Some(&MapTarget::Title(1)));
    }

    #[test]
    fn test_map_by_title_stops_at_episode_count() {
        let titles = vec![plain_title(1, 42), plain_title(2, 42), plain_title(3, 42)];
        let episodes = episodes(2);
        let map = map_by_title(&titles, &episodes, &DurationWindow::from_minutes(40, 45));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_iteration_order_is_episode_number() {
        let mut map = EpisodeMap::new();
        map.insert(Episode::new(3, "c"), MapTarget::Title(3));
        map.insert(Episode::new(1, "a"), MapTarget::Title(1));
        map.insert(Episode::new(2, "b"), MapTarget::Title(2));

        let numbers: Vec<u32> = map.iter().map(|(e, _)| e.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn test_chapter_mapping_is_complete_and_gap_free() {
        let titles = vec![title_with_chapters(1, &[10, 12, 9, 11, 10, 8])];
        let episodes = episodes(3);
        let map = map_by_chapters(&titles, &episodes, &DurationWindow::from_minutes(18, 23), None)
            .unwrap();

        // Ranges laid end to end reconstruct the full chapter sequence
        let mut expected_first = 1;
        for (_, target) in map.iter() {
            match target {
                MapTarget::Chapters { first, last, .. } => {
                    assert_eq!(*first, expected_first);
                    assert!(*last >= *first);
                    expected_first = last + 1;
                }
                other => panic!("unexpected target {:?}", other),
            }
        }
        assert_eq!(expected_first, 7);
    }

    #[test]
    fn test_window_property_holds_for_mapping() {
        let titles = vec![title_with_chapters(1, &[10, 12, 9, 11, 10, 8])];
        let episodes = episodes(3);
        let window = DurationWindow::from_minutes(18, 23);
        let map = map_by_chapters(&titles, &episodes, &window, None).unwrap();

        for (_, target) in map.iter() {
            if let MapTarget::Chapters { first, last, .. } = target {
                assert!(window.contains(titles[0].chapters_duration(*first, *last)));
            }
        }
    }

    #[test]
    fn test_automap_prefers_whole_titles() {
        let titles = vec![plain_title(1, 42), plain_title(2, 41)];
        let episodes = episodes(2);
        let map = automap(
            &titles,
            &episodes,
            &DurationWindow::from_minutes(40, 45),
            None,
            ChapterMapOptions::default(),
        )
        .unwrap();
        assert_eq!(map.get(&episodes[0]), Some(&MapTarget::Title(1)));
    }

    #[test]
    fn test_automap_falls_back_to_chapters() {
        let titles = vec![title_with_chapters(1, &[10, 10, 11, 9])];
        let episodes = episodes(2);
        let map = automap(
            &titles,
            &episodes,
            &DurationWindow::from_minutes(18, 22),
            None,
            ChapterMapOptions::default(),
        )
        .unwrap();
        assert_eq!(
            map.get(&episodes[0]),
            Some(&MapTarget::Chapters { title: 1, first: 1, last: 2 })
        );
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(minutes(20)), "00:20:00");
        assert_eq!(format_duration(Duration::from_secs(3723)), "01:02:03");
    }

    #[test]
    fn test_candidate_rendering() {
        let titles = vec![title_with_chapters(1, &[10, 10, 10, 10])];
        let episodes = episodes(2);
        let mut seen = Vec::new();
        let mut record = |candidates: &[Candidate]| {
            seen = candidates.to_vec();
            Some(2)
        };
        map_by_chapters(
            &titles,
            &episodes,
            &DurationWindow::from_minutes(9, 31),
            Some(&mut record),
        )
        .unwrap();

        let rendered = seen[1].to_string();
        assert_eq!(
            rendered,
            "Episode 1 = Chapters 1-2 (00:20:00)\nEpisode 2 = Chapters 3-4 (00:20:00)"
        );
    }
}
