/// HandBrake scan report parser
///
/// HandBrakeCLI's title scan (`-t 0`) writes a plain-text report describing
/// every title on the source together with its chapters and tracks. This
/// parser walks that report line by line with a small state machine and
/// builds the disc model from it.
use super::{AudioTrack, Chapter, Disc, Result, ScanError, SubtitleTrack, Title};
use regex::Regex;
use std::time::Duration;
use tracing::debug;

/// Compiled line patterns for the scan report
struct ScanPatterns {
    read_error_dvdread: Regex,
    read_error_dvdnav: Regex,
    serial: Regex,
    title: Regex,
    duration: Regex,
    stats: Regex,
    crop: Regex,
    combing: Regex,
    chapters_header: Regex,
    chapter: Regex,
    audio_header: Regex,
    audio_track: Regex,
    subtitle_header: Regex,
    subtitle_track: Regex,
}

impl ScanPatterns {
    fn new() -> Self {
        Self {
            read_error_dvdread: Regex::new(r"libdvdread: Can't open .* for reading").unwrap(),
            read_error_dvdnav: Regex::new(r"libdvdnav: vm: failed to open/read the DVD").unwrap(),
            serial: Regex::new(r"^libdvdnav: DVD Serial Number: (?P<serial>.*)$").unwrap(),
            title: Regex::new(r"^\+ title (?P<number>\d+):$").unwrap(),
            duration: Regex::new(r"^  \+ duration: (?P<duration>.*)$").unwrap(),
            stats: Regex::new(
                r"^  \+ size: (?P<width>\d+)x(?P<height>\d+), aspect: (?P<aspect>[\d.]+), (?P<fps>[\d.]+) fps$",
            )
            .unwrap(),
            crop: Regex::new(r"^  \+ autocrop: (?P<crop>[\d/]+)$").unwrap(),
            combing: Regex::new(r"^  \+ combing detected,.*$").unwrap(),
            chapters_header: Regex::new(r"^  \+ chapters:$").unwrap(),
            chapter: Regex::new(
                r"^    \+ (?P<number>\d+): cells \d+->\d+, \d+ blocks, duration (?P<duration>.*)$",
            )
            .unwrap(),
            audio_header: Regex::new(r"^  \+ audio tracks:$").unwrap(),
            audio_track: Regex::new(
                r"^    \+ (?P<number>\d+), (?P<name>[^(]*) \((?P<encoding>[^)]*)\)( \((?P<label>[^)]*)\))? \((?P<mix>[^)]*)\) \(iso639-2: (?P<language>[a-z]{2,3})\), (?P<rate>\d+)Hz, (?P<bitrate>\d+)bps$",
            )
            .unwrap(),
            subtitle_header: Regex::new(r"^  \+ subtitle tracks:$").unwrap(),
            subtitle_track: Regex::new(
                r"^    \+ (?P<number>\d+), (?P<name>.*) \(iso639-2: (?P<language>[a-z]{2,3})\)( \((?P<kind>.*)\))?$",
            )
            .unwrap(),
        }
    }
}

/// Which indented block the parser is currently inside
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Title,
    Chapters,
    Audio,
    Subtitles,
}

/// Parse a complete HandBrake scan report into a disc model
///
/// Lines that match no known pattern are skipped; HandBrake interleaves the
/// report with log output from its libraries.
pub fn parse_scan_report(source: &str, report: &str) -> Result<Disc> {
    let patterns = ScanPatterns::new();
    let mut disc = Disc {
        source: source.to_string(),
        serial: None,
        fingerprint: String::new(),
        titles: Vec::new(),
    };
    let mut current: Option<Title> = None;
    let mut section = Section::Title;

    for line in report.lines() {
        if patterns.read_error_dvdread.is_match(line) || patterns.read_error_dvdnav.is_match(line) {
            return Err(ScanError::UnreadableSource(source.to_string()));
        }
        if let Some(caps) = patterns.serial.captures(line) {
            disc.serial = Some(caps["serial"].to_string());
            continue;
        }
        if let Some(caps) = patterns.title.captures(line) {
            if let Some(title) = current.take() {
                disc.titles.push(finish_title(title));
            }
            current = Some(Title::new(parse_number(&caps["number"], line)?));
            section = Section::Title;
            continue;
        }

        let title = match current.as_mut() {
            Some(title) => title,
            None => continue,
        };

        if let Some(caps) = patterns.duration.captures(line) {
            title.duration = parse_duration(&caps["duration"], line)?;
            section = Section::Title;
        } else if let Some(caps) = patterns.stats.captures(line) {
            title.size = (
                parse_number(&caps["width"], line)?,
                parse_number(&caps["height"], line)?,
            );
            title.aspect_ratio = caps["aspect"].parse().unwrap_or(0.0);
            title.frame_rate = caps["fps"].parse().unwrap_or(0.0);
            section = Section::Title;
        } else if let Some(caps) = patterns.crop.captures(line) {
            let values: Vec<u32> = caps["crop"]
                .split('/')
                .map(|v| parse_number(v, line))
                .collect::<Result<_>>()?;
            if values.len() == 4 {
                title.crop = (values[0], values[1], values[2], values[3]);
            }
            section = Section::Title;
        } else if patterns.combing.is_match(line) {
            title.interlaced = true;
        } else if patterns.chapters_header.is_match(line) {
            section = Section::Chapters;
        } else if patterns.audio_header.is_match(line) {
            section = Section::Audio;
        } else if patterns.subtitle_header.is_match(line) {
            section = Section::Subtitles;
        } else if section == Section::Chapters {
            if let Some(caps) = patterns.chapter.captures(line) {
                title.chapters.push(Chapter::new(
                    parse_number(&caps["number"], line)?,
                    parse_duration(&caps["duration"], line)?,
                ));
            }
        } else if section == Section::Audio {
            if let Some(caps) = patterns.audio_track.captures(line) {
                let name = match caps.name("label") {
                    Some(label) => format!("{} ({})", &caps["name"], label.as_str()),
                    None => caps["name"].to_string(),
                };
                title.audio_tracks.push(AudioTrack {
                    number: parse_number(&caps["number"], line)?,
                    name,
                    language: caps["language"].to_string(),
                    encoding: caps["encoding"].to_string(),
                    channel_mix: caps["mix"].to_string(),
                    sample_rate: parse_number(&caps["rate"], line)?,
                    bit_rate: parse_number(&caps["bitrate"], line)?,
                    best: false,
                });
            }
        } else if section == Section::Subtitles {
            if let Some(caps) = patterns.subtitle_track.captures(line) {
                title.subtitle_tracks.push(SubtitleTrack {
                    number: parse_number(&caps["number"], line)?,
                    name: caps["name"].to_string(),
                    language: caps["language"].to_string(),
                    kind: caps.name("kind").map(|k| k.as_str().to_string()),
                    best: false,
                });
            }
        }
    }

    if let Some(title) = current.take() {
        disc.titles.push(finish_title(title));
    }
    disc.titles.sort_by_key(|t| t.number);
    disc.fingerprint = disc.compute_fingerprint();

    debug!(
        "Parsed scan report for {}: {} titles, serial {:?}",
        source,
        disc.titles.len(),
        disc.serial
    );
    Ok(disc)
}

/// Close a title: order its children and flag the preferred tracks
fn finish_title(mut title: Title) -> Title {
    title.chapters.sort_by_key(|c| c.number);
    title.audio_tracks.sort_by_key(|t| t.number);
    title.subtitle_tracks.sort_by_key(|t| t.number);
    title.mark_best_tracks();
    title
}

fn parse_number<T: std::str::FromStr>(value: &str, line: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ScanError::Malformed(line.to_string()))
}

/// Parse a `HH:MM:SS` timestamp as reported by HandBrake
pub(crate) fn parse_duration(value: &str, line: &str) -> Result<Duration> {
    let parts: Vec<&str> = value.trim().split(':').collect();
    if parts.len() != 3 {
        return Err(ScanError::Malformed(line.to_string()));
    }
    let hours: u64 = parse_number(parts[0], line)?;
    let minutes: u64 = parse_number(parts[1], line)?;
    let seconds: u64 = parse_number(parts[2], line)?;
    Ok(Duration::from_secs(hours * 3600 + minutes * 60 + seconds))
}
