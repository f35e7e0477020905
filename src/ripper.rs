/// Episode ripping and tagging
///
/// Drives HandBrakeCLI to transcode one mapped episode (a whole title or a
/// chapter span) into an MP4, then tags the result with AtomicParsley.
use crate::config::{Config, Decomb, SubtitleFormat};
use crate::database::Episode;
use crate::episodemap::MapTarget;
use crate::scan::{Disc, Title};
use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::info;

/// Render the output filename for an episode from the configured template
///
/// `{episode}` is zero-padded to two digits; path separators in episode
/// names are flattened.
pub fn render_filename(template: &str, program: &str, season: u32, episode: &Episode) -> String {
    template
        .replace("{program}", program)
        .replace("{season}", &season.to_string())
        .replace("{episode}", &format!("{:02}", episode.number))
        .replace("{name}", &episode.name.replace('/', "-"))
}

/// Rips mapped episodes from a scanned disc
#[derive(Debug, Clone)]
pub struct Ripper {
    config: Config,
}

impl Ripper {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Output path for an episode under the configured target directory
    pub fn output_path(&self, program: &str, season: u32, episode: &Episode) -> PathBuf {
        self.config
            .output
            .target
            .join(render_filename(&self.config.output.template, program, season, episode))
    }

    /// Build the HandBrake argument list for one episode
    pub fn rip_args(&self, title: &Title, target: &MapTarget, output: &Path) -> Vec<String> {
        let encoding = &self.config.encoding;
        let mut args = vec![
            "-i".to_string(),
            self.config.rip.source.clone(),
            "-t".to_string(),
            title.number.to_string(),
            "-o".to_string(),
            output.to_string_lossy().into_owned(),
            "-f".to_string(),
            "mp4".to_string(),
            // Optimize for streaming, include chapter markers, keep the
            // pixel aspect ratio
            "-O".to_string(),
            "-m".to_string(),
            "--strict-anamorphic".to_string(),
            "-e".to_string(),
            "x264".to_string(),
            "-q".to_string(),
            encoding.quality.to_string(),
            "-x".to_string(),
            encoding.x264_options.clone(),
        ];

        let mut audio = title.best_audio_tracks(&self.config.audio.languages);
        if !self.config.audio.all_tracks {
            audio.truncate(1);
        }
        if !audio.is_empty() {
            args.push("-a".to_string());
            args.push(audio.iter().map(|t| t.number.to_string()).collect::<Vec<_>>().join(","));
            args.push("-6".to_string());
            args.push(vec![self.config.audio.mix.clone(); audio.len()].join(","));
            args.push("-A".to_string());
            args.push(audio.iter().map(|t| t.name.clone()).collect::<Vec<_>>().join(","));
        }

        if let MapTarget::Chapters { first, last, .. } = target {
            args.push("-c".to_string());
            if last > first {
                args.push(format!("{}-{}", first, last));
            } else {
                args.push(first.to_string());
            }
        }

        if self.config.subtitles.format == SubtitleFormat::Vobsub {
            let mut subtitles = title.best_subtitle_tracks(&self.config.subtitles.languages);
            if !self.config.subtitles.all_tracks {
                subtitles.truncate(1);
            }
            if !subtitles.is_empty() {
                args.push("-s".to_string());
                args.push(
                    subtitles
                        .iter()
                        .map(|t| t.number.to_string())
                        .collect::<Vec<_>>()
                        .join(","),
                );
            }
        }

        match self.config.encoding.decomb {
            Decomb::On => {
                args.push("-d".to_string());
                args.push("slow".to_string());
            }
            Decomb::Auto => args.push("-5".to_string()),
            Decomb::Off => {}
        }

        args
    }

    /// Build the AtomicParsley argument list for one ripped file
    pub fn tag_args(
        &self,
        output: &Path,
        scratch: &Path,
        program: &str,
        season: u32,
        episode: &Episode,
    ) -> Vec<String> {
        vec![
            output.to_string_lossy().into_owned(),
            "-o".to_string(),
            scratch.to_string_lossy().into_owned(),
            "--stik".to_string(),
            "TV Show".to_string(),
            // TV show tags
            "--TVShowName".to_string(),
            program.to_string(),
            "--TVSeasonNum".to_string(),
            season.to_string(),
            "--TVEpisodeNum".to_string(),
            episode.number.to_string(),
            "--TVEpisode".to_string(),
            episode.name.clone(),
            // Music tags as well, these have wider player support
            "--artist".to_string(),
            program.to_string(),
            "--album".to_string(),
            format!("Season {}", season),
            "--tracknum".to_string(),
            episode.number.to_string(),
            "--title".to_string(),
            episode.name.clone(),
        ]
    }

    /// Transcode and tag one mapped episode, returning the output path
    pub async fn rip_episode(
        &self,
        disc: &Disc,
        program: &str,
        season: u32,
        episode: &Episode,
        target: &MapTarget,
    ) -> Result<PathBuf> {
        let title_number = match target {
            MapTarget::Title(number) => *number,
            MapTarget::Chapters { title, .. } => *title,
        };
        let title = disc
            .title(title_number)
            .ok_or_else(|| anyhow!("disc has no title {}", title_number))?;

        let output = self.output_path(program, season, episode);
        info!(
            "🎬 Ripping episode {} ({}) from {} to {}",
            episode.number,
            target,
            disc.source,
            output.display()
        );

        let status = Command::new(&self.config.paths.handbrake)
            .args(self.rip_args(title, target, &output))
            .status()
            .await?;
        if !status.success() {
            return Err(anyhow!("HandBrake exited with non-zero status {}", status));
        }

        self.tag_output(&output, program, season, episode).await?;
        info!("✅ Ripped episode {}: {}", episode.number, output.display());
        Ok(output)
    }

    /// Tag the ripped file in place via a scratch copy
    async fn tag_output(
        &self,
        output: &Path,
        program: &str,
        season: u32,
        episode: &Episode,
    ) -> Result<()> {
        let scratch = tempfile::Builder::new()
            .prefix(".seriesrip-tag-")
            .suffix(".mp4")
            .tempfile_in(&self.config.output.temp)?
            .into_temp_path();

        let status = Command::new(&self.config.paths.atomicparsley)
            .args(self.tag_args(output, &scratch, program, season, episode))
            .status()
            .await?;
        if !status.success() {
            return Err(anyhow!(
                "AtomicParsley exited with non-zero status {}",
                status
            ));
        }

        // The scratch file may live on another filesystem, so copy rather
        // than rename; it is cleaned up on drop
        tokio::fs::copy(&scratch, output).await?;
        Ok(())
    }
}
