/// Program, season and episode records plus their on-disk library
///
/// Each program is persisted as one JSON document under the library's data
/// directory and cached in memory for the lifetime of the process.
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Represents a program (a TV series)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    /// Program name, unique within the library
    pub name: String,
    /// Seasons, ordered by number
    pub seasons: Vec<Season>,
}

impl Program {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            seasons: Vec::new(),
        }
    }

    /// Look up a season by its number
    pub fn season(&self, number: u32) -> Option<&Season> {
        self.seasons.iter().find(|s| s.number == number)
    }

    pub fn season_mut(&mut self, number: u32) -> Option<&mut Season> {
        self.seasons.iter_mut().find(|s| s.number == number)
    }

    /// Check the record constraints before the program is persisted
    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(anyhow!("program name must not be empty"));
        }
        for season in &self.seasons {
            season.validate(&self.name)?;
        }
        Ok(())
    }
}

/// Represents a season of a program
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Season {
    /// Season number, >= 1
    pub number: u32,
    /// Episodes, ordered by number
    pub episodes: Vec<Episode>,
}

impl Season {
    pub fn new(number: u32) -> Self {
        Self {
            number,
            episodes: Vec::new(),
        }
    }

    /// Look up an episode by its number
    pub fn episode(&self, number: u32) -> Option<&Episode> {
        self.episodes.iter().find(|e| e.number == number)
    }

    /// Episodes that have no recorded rip yet, in number order
    pub fn unripped_episodes(&self) -> Vec<Episode> {
        let mut episodes: Vec<Episode> = self
            .episodes
            .iter()
            .filter(|e| !e.is_ripped())
            .cloned()
            .collect();
        episodes.sort();
        episodes
    }

    fn validate(&self, program: &str) -> Result<()> {
        if self.number < 1 {
            return Err(anyhow!("{}: season numbers start at 1", program));
        }
        let mut seen = HashSet::new();
        for episode in &self.episodes {
            if episode.number < 1 {
                return Err(anyhow!(
                    "{} season {}: episode numbers start at 1",
                    program,
                    self.number
                ));
            }
            if !seen.insert(episode.number) {
                return Err(anyhow!(
                    "{} season {}: duplicate episode number {}",
                    program,
                    self.number,
                    episode.number
                ));
            }
            if let Some(record) = &episode.ripped {
                record.validate(program, self.number, episode.number)?;
            }
        }
        Ok(())
    }
}

/// Represents an episode of a season of a program
///
/// Ordering is by number first, so sorted collections of episodes iterate in
/// broadcast order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Episode {
    /// Episode number, unique within its season
    pub number: u32,
    /// Episode name
    pub name: String,
    /// Where this episode was ripped from, if it has been
    pub ripped: Option<RipRecord>,
}

impl Episode {
    pub fn new(number: u32, name: impl Into<String>) -> Self {
        Self {
            number,
            name: name.into(),
            ripped: None,
        }
    }

    pub fn is_ripped(&self) -> bool {
        self.ripped.is_some()
    }
}

/// Records the disc location an episode was ripped from
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RipRecord {
    /// Fingerprint of the source disc
    pub disc_fingerprint: String,
    /// Title number the content came from
    pub title: u32,
    /// First chapter of the range, when ripped by chapters
    pub start_chapter: Option<u32>,
    /// Last chapter of the range, when ripped by chapters
    pub end_chapter: Option<u32>,
    /// When the rip completed
    pub ripped_at: DateTime<Utc>,
}

impl RipRecord {
    /// Record that content for a mapping target was ripped from the disc
    /// with the given fingerprint
    pub fn for_target(fingerprint: impl Into<String>, target: &crate::episodemap::MapTarget) -> Self {
        use crate::episodemap::MapTarget;
        let (title, start_chapter, end_chapter) = match target {
            MapTarget::Title(number) => (*number, None, None),
            MapTarget::Chapters { title, first, last } => (*title, Some(*first), Some(*last)),
        };
        Self {
            disc_fingerprint: fingerprint.into(),
            title,
            start_chapter,
            end_chapter,
            ripped_at: Utc::now(),
        }
    }

    fn validate(&self, program: &str, season: u32, episode: u32) -> Result<()> {
        if let (Some(start), Some(end)) = (self.start_chapter, self.end_chapter) {
            if end < start {
                return Err(anyhow!(
                    "{} season {} episode {}: chapter range {}-{} is inverted",
                    program,
                    season,
                    episode,
                    start,
                    end
                ));
            }
        }
        Ok(())
    }
}

/// On-disk program library with an in-memory cache
#[derive(Debug, Clone)]
pub struct Library {
    /// Directory holding one JSON document per program
    data_dir: PathBuf,

    /// Cached programs, keyed by name (thread-safe)
    programs: Arc<RwLock<HashMap<String, Program>>>,
}

impl Library {
    /// Open a library, creating the data directory if needed and loading
    /// every stored program into the cache
    pub async fn new(data_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&data_dir).await?;

        let library = Self {
            data_dir,
            programs: Arc::new(RwLock::new(HashMap::new())),
        };
        let loaded = library.load_existing().await?;
        info!("📚 Library initialized with {} program(s)", loaded);
        Ok(library)
    }

    async fn load_existing(&self) -> Result<usize> {
        let mut entries = fs::read_dir(&self.data_dir).await?;
        let mut cache = self.programs.write().await;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().map_or(false, |ext| ext == "json") {
                match fs::read_to_string(&path).await {
                    Ok(content) => match serde_json::from_str::<Program>(&content) {
                        Ok(program) => {
                            cache.insert(program.name.clone(), program);
                        }
                        Err(e) => warn!("Skipping malformed program file {}: {}", path.display(), e),
                    },
                    Err(e) => warn!("Failed to read program file {}: {}", path.display(), e),
                }
            }
        }
        Ok(cache.len())
    }

    fn program_path(&self, name: &str) -> PathBuf {
        let stem: String = name
            .chars()
            .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
            .collect();
        self.data_dir.join(format!("{}.json", stem))
    }

    /// Names of all stored programs, sorted
    pub async fn programs(&self) -> Vec<String> {
        let mut names: Vec<String> = self.programs.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Fetch a program by name
    pub async fn get_program(&self, name: &str) -> Option<Program> {
        self.programs.read().await.get(name).cloned()
    }

    /// Validate and persist a program, replacing any previous version
    pub async fn save_program(&self, program: Program) -> Result<()> {
        program.validate()?;
        let path = self.program_path(&program.name);
        let content = serde_json::to_string_pretty(&program)?;
        fs::write(&path, content).await?;
        self.programs
            .write()
            .await
            .insert(program.name.clone(), program);
        Ok(())
    }

    /// Attach a rip record to an episode and persist the change
    pub async fn record_rip(
        &self,
        program: &str,
        season: u32,
        episode: u32,
        record: RipRecord,
    ) -> Result<()> {
        let mut updated = self
            .get_program(program)
            .await
            .ok_or_else(|| anyhow!("unknown program: {}", program))?;
        let target = updated
            .season_mut(season)
            .ok_or_else(|| anyhow!("{} has no season {}", program, season))?
            .episodes
            .iter_mut()
            .find(|e| e.number == episode)
            .ok_or_else(|| anyhow!("{} season {} has no episode {}", program, season, episode))?;
        target.ripped = Some(record);
        self.save_program(updated).await
    }

    /// Episodes of a season that still need content, in number order
    pub async fn unripped_episodes(&self, program: &str, season: u32) -> Result<Vec<Episode>> {
        let program = self
            .get_program(program)
            .await
            .ok_or_else(|| anyhow!("unknown program: {}", program))?;
        let season = program
            .season(season)
            .ok_or_else(|| anyhow!("{} has no season {}", program.name, season))?;
        Ok(season.unripped_episodes())
    }
}
