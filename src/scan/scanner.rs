/// Disc scanner built on HandBrakeCLI
use super::{parse_scan_report, Disc, Result};
use std::path::PathBuf;
use tokio::process::Command;
use tracing::info;

/// Scans a DVD source by running a HandBrake title scan and parsing its
/// report
#[derive(Debug, Clone)]
pub struct DiscScanner {
    /// Path to the HandBrakeCLI executable
    handbrake: PathBuf,
}

impl DiscScanner {
    pub fn new(handbrake: impl Into<PathBuf>) -> Self {
        Self {
            handbrake: handbrake.into(),
        }
    }

    /// Scan the given source device or path for titles
    pub async fn scan(&self, source: &str) -> Result<Disc> {
        info!("📀 Scanning {} for titles", source);

        let output = Command::new(&self.handbrake)
            .args(["-i", source, "-t", "0"])
            .output()
            .await?;

        // HandBrake splits the scan report across stdout and stderr
        let mut report = String::from_utf8_lossy(&output.stdout).into_owned();
        report.push('\n');
        report.push_str(&String::from_utf8_lossy(&output.stderr));

        let disc = parse_scan_report(source, &report)?;
        info!("✅ Found {} title(s) on {}", disc.titles.len(), source);
        Ok(disc)
    }
}
