/// Depth-first search over chapter partitions
///
/// A candidate partition is a sequence of run lengths: [2, 3, 2] assigns the
/// first two chapters to the first episode, the next three to the second and
/// so on. The search enumerates every sequence whose runs all fall inside
/// the duration window and together consume the whole chapter list.
use super::DurationWindow;
use crate::scan::Chapter;
use std::time::Duration;

/// Iterate `chapters` in consecutive groups of the lengths in `runs`
pub(super) fn partition<'a>(
    chapters: &'a [Chapter],
    runs: &'a [usize],
) -> impl Iterator<Item = &'a [Chapter]> + 'a {
    let mut index = 0;
    runs.iter().map(move |&count| {
        let group = &chapters[index.min(chapters.len())..(index + count).min(chapters.len())];
        index += count;
        group
    })
}

/// Check whether a candidate run-length sequence is a valid partition
pub(super) fn valid(
    runs: &[usize],
    episode_count: usize,
    chapters: &[Chapter],
    window: &DurationWindow,
) -> bool {
    // Never more runs than episodes needing content
    runs.len() <= episode_count
        // Every chapter consumed exactly once
        && runs.iter().sum::<usize>() == chapters.len()
        // Every run inside the duration window
        && partition(chapters, runs)
            .all(|group| window.contains(group.iter().map(|c| c.duration).sum()))
}

/// Enumerate all valid partitions of `chapters` into at most `episode_count`
/// runs, in stable depth-first order
pub(super) fn solutions(
    chapters: &[Chapter],
    episode_count: usize,
    window: &DurationWindow,
) -> Vec<Vec<usize>> {
    let mut prefix = Vec::new();
    let mut found = Vec::new();
    search(chapters, episode_count, window, &mut prefix, &mut found);
    found
}

fn search(
    chapters: &[Chapter],
    episode_count: usize,
    window: &DurationWindow,
    prefix: &mut Vec<usize>,
    found: &mut Vec<Vec<usize>>,
) {
    let assigned: usize = prefix.iter().sum();
    let mut duration = Duration::ZERO;
    // Grow the run starting at the first unassigned chapter one chapter at a
    // time; each in-window length is both a possible solution and the prefix
    // of deeper ones.
    for (count, chapter) in chapters[assigned..].iter().enumerate() {
        duration += chapter.duration;
        if duration > window.max {
            // Every longer run from this start point overshoots too
            break;
        }
        if duration >= window.min {
            prefix.push(count + 1);
            if valid(prefix, episode_count, chapters, window) {
                found.push(prefix.clone());
            }
            search(chapters, episode_count, window, prefix, found);
            prefix.pop();
        }
    }
}
