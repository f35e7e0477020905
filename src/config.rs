use crate::episodemap::{ChapterMapOptions, DurationWindow};
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the series ripper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// External tool locations
    pub paths: PathsConfig,

    /// Source selection and episode mapping settings
    pub rip: RipConfig,

    /// Output and filename settings
    pub output: OutputConfig,

    /// Audio track selection
    pub audio: AudioConfig,

    /// Subtitle track selection
    pub subtitles: SubtitleConfig,

    /// Video encoding settings
    pub encoding: EncodingConfig,

    /// Program library settings
    pub library: LibraryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// HandBrakeCLI executable
    pub handbrake: PathBuf,

    /// AtomicParsley executable used for tagging
    pub atomicparsley: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RipConfig {
    /// Source device or path to scan and rip from
    pub source: String,

    /// Program the next rips belong to
    pub program: Option<String>,

    /// Season the next rips belong to
    pub season: Option<u32>,

    /// Minimum expected episode duration in minutes
    pub duration_min: u64,

    /// Maximum expected episode duration in minutes
    pub duration_max: u64,

    /// Ignore trailing zero-duration chapters when mapping
    pub strip_trailing_chapters: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory ripped episodes are written to
    pub target: PathBuf,

    /// Directory for temporary files during tagging
    pub temp: PathBuf,

    /// Output filename template; supports {program}, {season}, {episode}
    /// and {name} placeholders
    pub template: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Preferred audio languages (iso639-2); empty accepts all
    pub languages: Vec<String>,

    /// Audio mixdown passed to HandBrake
    pub mix: String,

    /// Rip every matching track instead of the first
    pub all_tracks: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtitleConfig {
    /// Subtitle handling mode
    pub format: SubtitleFormat,

    /// Preferred subtitle languages (iso639-2); empty accepts all
    pub languages: Vec<String>,

    /// Rip every matching track instead of the first
    pub all_tracks: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubtitleFormat {
    /// No subtitles in the output
    None,
    /// Embed the DVD bitmap subtitles
    Vobsub,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodingConfig {
    /// x264 constant quality factor
    pub quality: u8,

    /// Advanced x264 options string
    pub x264_options: String,

    /// Deinterlacing mode
    pub decomb: Decomb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decomb {
    Off,
    On,
    Auto,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Directory the program library is stored in
    pub data_dir: PathBuf,
}

impl Config {
    /// Load configuration from the usual file locations
    pub fn load() -> Result<Self> {
        let config_paths = [
            "seriesrip.toml",
            "config/seriesrip.toml",
            "/etc/seriesrip/config.toml",
        ];

        for path in &config_paths {
            if let Ok(config_str) = std::fs::read_to_string(path) {
                match toml::from_str(&config_str) {
                    Ok(config) => {
                        tracing::info!("📄 Loaded configuration from: {}", path);
                        return Ok(config);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config file {}: {}", path, e);
                    }
                }
            }
        }

        let mut config = Self::default();
        config.apply_env();
        Ok(config)
    }

    /// Override settings from environment variables
    fn apply_env(&mut self) {
        if let Ok(source) = std::env::var("SERIESRIP_SOURCE") {
            self.rip.source = source;
        }
        if let Ok(target) = std::env::var("SERIESRIP_TARGET") {
            self.output.target = PathBuf::from(target);
        }
        if let Ok(data_dir) = std::env::var("SERIESRIP_DATA_DIR") {
            self.library.data_dir = PathBuf::from(data_dir);
        }
        if let Ok(min) = std::env::var("SERIESRIP_DURATION_MIN") {
            self.rip.duration_min = min.parse().unwrap_or(self.rip.duration_min);
        }
        if let Ok(max) = std::env::var("SERIESRIP_DURATION_MAX") {
            self.rip.duration_max = max.parse().unwrap_or(self.rip.duration_max);
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &str) -> Result<()> {
        let config_str = toml::to_string_pretty(self)?;
        std::fs::write(path, config_str)?;
        tracing::info!("💾 Configuration saved to: {}", path);
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.rip.duration_min > self.rip.duration_max {
            return Err(anyhow!(
                "duration_min ({}) must not exceed duration_max ({})",
                self.rip.duration_min,
                self.rip.duration_max
            ));
        }

        if self.encoding.quality > 51 {
            return Err(anyhow!("quality must be between 0 and 51"));
        }

        if !self.output.template.contains("{episode}") {
            return Err(anyhow!("filename template must contain {{episode}}"));
        }

        if !self.output.target.exists() {
            if let Err(e) = std::fs::create_dir_all(&self.output.target) {
                return Err(anyhow!("cannot create target directory: {}", e));
            }
        }

        Ok(())
    }

    /// The expected episode duration window
    pub fn duration_window(&self) -> DurationWindow {
        DurationWindow::from_minutes(self.rip.duration_min, self.rip.duration_max)
    }

    /// Options for the chapter-partition mapper
    pub fn chapter_options(&self) -> ChapterMapOptions {
        ChapterMapOptions {
            strip_trailing_empty: self.rip.strip_trailing_chapters,
        }
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "Series Ripper Configuration:\n\
            - Source: {}\n\
            - Target: {}\n\
            - Episode Duration: {}-{} minutes\n\
            - Audio Languages: {}\n\
            - Subtitles: {:?}\n\
            - Library: {}",
            self.rip.source,
            self.output.target.display(),
            self.rip.duration_min,
            self.rip.duration_max,
            self.audio.languages.join(", "),
            self.subtitles.format,
            self.library.data_dir.display(),
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            paths: PathsConfig {
                handbrake: PathBuf::from("HandBrakeCLI"),
                atomicparsley: PathBuf::from("AtomicParsley"),
            },
            rip: RipConfig {
                source: "/dev/dvd".to_string(),
                program: None,
                season: None,
                duration_min: 40,
                duration_max: 50,
                strip_trailing_chapters: true,
            },
            output: OutputConfig {
                target: PathBuf::from("./videos"),
                temp: std::env::temp_dir(),
                template: "{program} - {season}x{episode} - {name}.mp4".to_string(),
            },
            audio: AudioConfig {
                languages: vec!["eng".to_string()],
                mix: "dpl2".to_string(),
                all_tracks: false,
            },
            subtitles: SubtitleConfig {
                format: SubtitleFormat::None,
                languages: vec!["eng".to_string()],
                all_tracks: false,
            },
            encoding: EncodingConfig {
                quality: 23,
                x264_options: "b-adapt=2:rc-lookahead=50".to_string(),
                decomb: Decomb::Off,
            },
            library: LibraryConfig {
                data_dir: PathBuf::from("./library"),
            },
        }
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.config.rip.source = source.into();
        self
    }

    pub fn with_target(mut self, target: PathBuf) -> Self {
        self.config.output.target = target;
        self
    }

    pub fn with_data_dir(mut self, data_dir: PathBuf) -> Self {
        self.config.library.data_dir = data_dir;
        self
    }

    pub fn with_duration_window(mut self, min: u64, max: u64) -> Self {
        self.config.rip.duration_min = min;
        self.config.rip.duration_max = max;
        self
    }

    pub fn with_program(mut self, program: impl Into<String>, season: u32) -> Self {
        self.config.rip.program = Some(program.into());
        self.config.rip.season = Some(season);
        self
    }

    pub fn with_subtitle_format(mut self, format: SubtitleFormat) -> Self {
        self.config.subtitles.format = format;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
