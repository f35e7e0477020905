/// Disc scanning module
///
/// This module models the contents of a DVD source (titles, chapters, audio
/// and subtitle tracks) and builds that model by parsing the textual scan
/// report produced by HandBrakeCLI.

pub mod parser;
pub mod scanner;

// Re-export main types
pub use parser::parse_scan_report;
pub use scanner::DiscScanner;

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Result type for scan operations
pub type Result<T> = std::result::Result<T, ScanError>;

/// Error types for scan operations
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unable to read source {0}")]
    UnreadableSource(String),

    #[error("malformed scan report line: {0}")]
    Malformed(String),
}

/// Audio channel mixes in order of preference
pub const AUDIO_MIX_ORDER: [&str; 5] = ["5.1 ch", "5.0 ch", "Dolby Surround", "2.0 ch", "1.0 ch"];

/// Audio encodings in order of preference
pub const AUDIO_ENCODING_ORDER: [&str; 2] = ["DTS", "AC3"];

/// Represents a scanned DVD source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Disc {
    /// Source device or path the scan was taken from
    pub source: String,
    /// Serial number reported by libdvdnav, if any
    pub serial: Option<String>,
    /// Fingerprint derived from the serial and title layout
    pub fingerprint: String,
    /// Titles found on the disc, ordered by number
    pub titles: Vec<Title>,
}

impl Disc {
    /// Look up a title by its number
    pub fn title(&self, number: u32) -> Option<&Title> {
        self.titles.iter().find(|t| t.number == number)
    }

    /// The title with the greatest total duration
    ///
    /// When several episodes are concatenated into one title, that title is
    /// the longest on the disc and is the input for chapter mapping.
    pub fn longest_title(&self) -> Option<&Title> {
        self.titles.iter().max_by_key(|t| t.duration)
    }

    /// Compute the disc fingerprint from the serial and title layout
    ///
    /// The serial alone is not unique across some pressings, so the title
    /// durations and chapter layout are folded in as well.
    pub(crate) fn compute_fingerprint(&self) -> String {
        let mut ctx = md5::Context::new();
        ctx.consume(self.serial.as_deref().unwrap_or(""));
        ctx.consume(self.titles.len().to_string());
        for title in &self.titles {
            ctx.consume(title.duration.as_secs().to_string());
            ctx.consume(title.chapters.len().to_string());
            for chapter in &title.chapters {
                ctx.consume(title.chapter_start(chapter.number).unwrap_or_default().as_secs().to_string());
                ctx.consume(chapter.duration.as_secs().to_string());
            }
        }
        format!("{:x}", ctx.compute())
    }
}

/// Represents one title on a disc
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Title {
    /// Title number as reported by the scan
    pub number: u32,
    /// Total duration of the title
    pub duration: Duration,
    /// Frame size as (width, height)
    pub size: (u32, u32),
    /// Display aspect ratio
    pub aspect_ratio: f64,
    /// Frame rate in frames per second
    pub frame_rate: f64,
    /// Autocrop values as (top, bottom, left, right)
    pub crop: (u32, u32, u32, u32),
    /// Whether combing was detected (interlaced or telecined content)
    pub interlaced: bool,
    /// Chapter markers, ordered by number
    pub chapters: Vec<Chapter>,
    /// Audio tracks, ordered by number
    pub audio_tracks: Vec<AudioTrack>,
    /// Subtitle tracks, ordered by number
    pub subtitle_tracks: Vec<SubtitleTrack>,
}

impl Title {
    /// An empty title with the given number
    pub fn new(number: u32) -> Self {
        Self {
            number,
            duration: Duration::ZERO,
            size: (0, 0),
            aspect_ratio: 0.0,
            frame_rate: 0.0,
            crop: (0, 0, 0, 0),
            interlaced: false,
            chapters: Vec::new(),
            audio_tracks: Vec::new(),
            subtitle_tracks: Vec::new(),
        }
    }

    /// Look up a chapter by its number
    pub fn chapter(&self, number: u32) -> Option<&Chapter> {
        self.chapters.iter().find(|c| c.number == number)
    }

    /// Offset of a chapter from the start of the title
    pub fn chapter_start(&self, number: u32) -> Option<Duration> {
        self.chapter(number)?;
        Some(
            self.chapters
                .iter()
                .take_while(|c| c.number < number)
                .map(|c| c.duration)
                .sum(),
        )
    }

    /// Summed duration of the inclusive chapter range [first, last]
    pub fn chapters_duration(&self, first: u32, last: u32) -> Duration {
        self.chapters
            .iter()
            .filter(|c| c.number >= first && c.number <= last)
            .map(|c| c.duration)
            .sum()
    }

    /// Audio tracks flagged best, filtered to the given languages
    ///
    /// An empty language list matches every track.
    pub fn best_audio_tracks(&self, languages: &[String]) -> Vec<&AudioTrack> {
        self.audio_tracks
            .iter()
            .filter(|t| t.best)
            .filter(|t| languages.is_empty() || languages.iter().any(|l| l == &t.language))
            .collect()
    }

    /// Subtitle tracks flagged best, filtered to the given languages
    pub fn best_subtitle_tracks(&self, languages: &[String]) -> Vec<&SubtitleTrack> {
        self.subtitle_tracks
            .iter()
            .filter(|t| t.best)
            .filter(|t| languages.is_empty() || languages.iter().any(|l| l == &t.language))
            .collect()
    }

    /// Flag the best audio and subtitle track in each same-named group
    ///
    /// Tracks often appear once per encoding and channel mix; the preferred
    /// combination per name wins.
    pub(crate) fn mark_best_tracks(&mut self) {
        let mut names: Vec<String> = self.audio_tracks.iter().map(|t| t.name.clone()).collect();
        names.sort();
        names.dedup();
        for name in &names {
            let best = self
                .audio_tracks
                .iter()
                .enumerate()
                .filter(|(_, t)| &t.name == name)
                .min_by_key(|(_, t)| {
                    (
                        AUDIO_MIX_ORDER
                            .iter()
                            .position(|m| *m == t.channel_mix)
                            .unwrap_or(AUDIO_MIX_ORDER.len()),
                        AUDIO_ENCODING_ORDER
                            .iter()
                            .position(|e| *e == t.encoding)
                            .unwrap_or(AUDIO_ENCODING_ORDER.len()),
                    )
                })
                .map(|(i, _)| i);
            if let Some(i) = best {
                self.audio_tracks[i].best = true;
            }
        }

        let mut names: Vec<String> = self.subtitle_tracks.iter().map(|t| t.name.clone()).collect();
        names.sort();
        names.dedup();
        for name in &names {
            let best = self
                .subtitle_tracks
                .iter()
                .position(|t| &t.name == name);
            if let Some(i) = best {
                self.subtitle_tracks[i].best = true;
            }
        }
    }
}

/// Represents a chapter marker within a title
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    /// Chapter number, unique and ascending within a title
    pub number: u32,
    /// Duration of the chapter
    pub duration: Duration,
}

impl Chapter {
    pub fn new(number: u32, duration: Duration) -> Self {
        Self { number, duration }
    }
}

/// Represents an audio track within a title
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioTrack {
    pub number: u32,
    pub name: String,
    pub language: String,
    pub encoding: String,
    pub channel_mix: String,
    pub sample_rate: u32,
    pub bit_rate: u32,
    /// Preferred track among those sharing its name
    pub best: bool,
}

/// Represents a subtitle track within a title
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtitleTrack {
    pub number: u32,
    pub name: String,
    pub language: String,
    /// Subtitle kind as reported by the scan, e.g. "Bitmap"
    pub kind: Option<String>,
    /// Preferred track among those sharing its name
    pub best: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minutes(m: u64) -> Duration {
        Duration::from_secs(m * 60)
    }

    fn title_with_chapters(durations: &[u64]) -> Title {
        let mut title = Title::new(1);
        for (i, m) in durations.iter().enumerate() {
            title.chapters.push(Chapter::new(i as u32 + 1, minutes(*m)));
        }
        title.duration = title.chapters.iter().map(|c| c.duration).sum();
        title
    }

    #[test]
    fn test_chapter_start_offsets() {
        let title = title_with_chapters(&[10, 10, 11, 9]);
        assert_eq!(title.chapter_start(1), Some(Duration::ZERO));
        assert_eq!(title.chapter_start(3), Some(minutes(20)));
        assert_eq!(title.chapter_start(5), None);
    }

    #[test]
    fn test_chapters_duration_inclusive() {
        let title = title_with_chapters(&[10, 10, 11, 9]);
        assert_eq!(title.chapters_duration(1, 2), minutes(20));
        assert_eq!(title.chapters_duration(3, 4), minutes(20));
        assert_eq!(title.chapters_duration(2, 2), minutes(10));
    }

    #[test]
    fn test_longest_title() {
        let mut disc = Disc {
            source: "/dev/dvd".to_string(),
            serial: None,
            fingerprint: String::new(),
            titles: vec![title_with_chapters(&[10]), title_with_chapters(&[10, 10])],
        };
        disc.titles[1].number = 2;
        assert_eq!(disc.longest_title().map(|t| t.number), Some(2));
    }

    #[test]
    fn test_mark_best_audio_prefers_mix_then_encoding() {
        let mut title = Title::new(1);
        let track = |number, encoding: &str, mix: &str| AudioTrack {
            number,
            name: "English".to_string(),
            language: "eng".to_string(),
            encoding: encoding.to_string(),
            channel_mix: mix.to_string(),
            sample_rate: 48000,
            bit_rate: 448000,
            best: false,
        };
        title.audio_tracks = vec![
            track(1, "AC3", "2.0 ch"),
            track(2, "AC3", "5.1 ch"),
            track(3, "DTS", "5.1 ch"),
        ];
        title.mark_best_tracks();
        let best: Vec<u32> = title.audio_tracks.iter().filter(|t| t.best).map(|t| t.number).collect();
        assert_eq!(best, vec![3]);
    }

    #[test]
    fn test_fingerprint_depends_on_layout() {
        let disc_a = Disc {
            source: "/dev/dvd".to_string(),
            serial: Some("ABC123".to_string()),
            fingerprint: String::new(),
            titles: vec![title_with_chapters(&[10, 10])],
        };
        let mut disc_b = disc_a.clone();
        disc_b.titles[0].chapters[1].duration = minutes(11);
        assert_ne!(disc_a.compute_fingerprint(), disc_b.compute_fingerprint());
    }
}
