/// Series Ripper
///
/// Scans TV series discs, maps titles and chapters onto episodes by
/// duration, and rips and tags each mapped episode.

pub mod config;
pub mod database;
pub mod episodemap;
pub mod ripper;
pub mod scan;

// Re-export main types for easy access
pub use crate::config::{Config, ConfigBuilder};
pub use crate::database::{Episode, Library, Program, RipRecord, Season};
pub use crate::episodemap::{
    automap, map_by_chapters, map_by_title, Candidate, ChapterMapOptions, DurationWindow,
    EpisodeMap, FirstSolutionResolver, MapError, MapTarget, SolutionResolver,
};
pub use crate::ripper::Ripper;
pub use crate::scan::{Chapter, Disc, DiscScanner, ScanError, Title};
