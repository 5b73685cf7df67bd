use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::ValueEnum;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

/// The fixed benchmark scenarios a campaign can exercise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Workload {
    /// Looping muted video playback served from the local content server.
    Video,
    /// CSS keyframe animation page.
    Animation,
    /// CPU-bound JavaScript computation page.
    JsComputation,
    /// A real remote webpage (the configured target URL).
    Webpage,
    /// One browser instance with many tabs on the target URL.
    MultipleTabs,
}

impl Workload {
    /// Fixed execution and reporting order.
    pub const ALL: [Workload; 5] = [
        Workload::Video,
        Workload::Animation,
        Workload::JsComputation,
        Workload::Webpage,
        Workload::MultipleTabs,
    ];

    /// Stable label used in artifact file names.
    pub fn label(&self) -> &'static str {
        match self {
            Workload::Video => "video",
            Workload::Animation => "animation",
            Workload::JsComputation => "js_computation",
            Workload::Webpage => "webpage",
            Workload::MultipleTabs => "multiple_tabs",
        }
    }

    /// Path of the locally served page backing this workload, if any.
    pub fn page_path(&self) -> Option<&'static str> {
        match self {
            Workload::Video => Some("/video.html"),
            Workload::Animation => Some("/animation.html"),
            Workload::JsComputation => Some("/jscomputation.html"),
            Workload::Webpage | Workload::MultipleTabs => None,
        }
    }
}

impl std::fmt::Display for Workload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Campaign configuration, constructed once and passed to every component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignSettings {
    /// Sampling window per run, in seconds.
    #[serde(default = "default_duration_secs")]
    pub duration_secs: u64,
    /// Cadence of the power sampling loop, in seconds.
    #[serde(default = "default_sample_interval_secs")]
    pub sample_interval_secs: u64,
    /// Full browser × workload passes to execute.
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    /// Target URL for the webpage and multiple-tabs workloads.
    #[serde(default = "default_test_url")]
    pub test_url: String,
    /// Port the local content server binds on.
    #[serde(default = "default_server_port")]
    pub server_port: u16,
    /// Optional override for where result artifacts are written.
    pub output_dir: Option<PathBuf>,
    /// Optional override for where video payload files live.
    pub media_dir: Option<PathBuf>,
    /// Video file names (relative to the media directory) offered as
    /// `<source>` entries on the video page.
    #[serde(default = "default_video_files")]
    pub video_files: Vec<String>,
    /// Idle delay between runs so power draw settles.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    /// Delay after launch before activation and sampling begin.
    #[serde(default = "default_settle_secs")]
    pub settle_secs: u64,
    /// Extra tabs opened for the multiple-tabs workload.
    #[serde(default = "default_tab_count")]
    pub tab_count: u32,
    /// Delay between successive tab opens.
    #[serde(default = "default_tab_open_delay_secs")]
    pub tab_open_delay_secs: u64,
    /// How long a browser gets to exit gracefully before a force-kill.
    #[serde(default = "default_grace_secs")]
    pub grace_secs: u64,
    /// Playback attempts the video page script makes before giving up.
    #[serde(default = "default_autoplay_retries")]
    pub autoplay_retries: u32,
    /// Browser subset by executable name; empty means every known candidate.
    #[serde(default)]
    pub browsers: Vec<String>,
    /// Workload subset; empty means all of them.
    #[serde(default)]
    pub workloads: Vec<Workload>,
}

fn default_duration_secs() -> u64 {
    60
}

fn default_sample_interval_secs() -> u64 {
    1
}

fn default_iterations() -> u32 {
    5
}

fn default_test_url() -> String {
    "https://www.lewisu.edu/".into()
}

fn default_server_port() -> u16 {
    8000
}

fn default_video_files() -> Vec<String> {
    vec!["test_VP9.webm".into()]
}

fn default_cooldown_secs() -> u64 {
    5
}

fn default_settle_secs() -> u64 {
    5
}

fn default_tab_count() -> u32 {
    10
}

fn default_tab_open_delay_secs() -> u64 {
    1
}

fn default_grace_secs() -> u64 {
    5
}

fn default_autoplay_retries() -> u32 {
    3
}

impl Default for CampaignSettings {
    fn default() -> Self {
        Self {
            duration_secs: default_duration_secs(),
            sample_interval_secs: default_sample_interval_secs(),
            iterations: default_iterations(),
            test_url: default_test_url(),
            server_port: default_server_port(),
            output_dir: None,
            media_dir: None,
            video_files: default_video_files(),
            cooldown_secs: default_cooldown_secs(),
            settle_secs: default_settle_secs(),
            tab_count: default_tab_count(),
            tab_open_delay_secs: default_tab_open_delay_secs(),
            grace_secs: default_grace_secs(),
            autoplay_retries: default_autoplay_retries(),
            browsers: Vec::new(),
            workloads: Vec::new(),
        }
    }
}

impl CampaignSettings {
    /// Load settings from disk, writing defaults if missing.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("Unable to read config at {}", path.display()))?;
            let parsed: Self = serde_json::from_str(&raw)
                .with_context(|| format!("Malformed config at {}", path.display()))?;
            Ok(parsed)
        } else {
            let settings = Self::default();
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create config directory {}", parent.display())
                })?;
            }
            let serialised = serde_json::to_string_pretty(&settings)?;
            fs::write(path, serialised)
                .with_context(|| format!("Failed to write default config to {}", path.display()))?;
            Ok(settings)
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory {}", parent.display())
            })?;
        }
        let serialised = serde_json::to_string_pretty(self)?;
        fs::write(path, serialised)
            .with_context(|| format!("Failed to persist config to {}", path.display()))
    }

    /// Directory where campaign artifacts (CSVs, log, report) land.
    pub fn resolve_output_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.output_dir {
            return Ok(dir.clone());
        }
        let dirs = project_dirs()?;
        Ok(dirs.data_dir().join("results"))
    }

    /// Directory the content server offers video payloads from.
    pub fn resolve_media_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.media_dir {
            return Ok(dir.clone());
        }
        let dirs = project_dirs()?;
        Ok(dirs.data_dir().join("media"))
    }

    /// Base URL of the local content server.
    pub fn server_base_url(&self) -> String {
        format!("http://localhost:{}", self.server_port)
    }

    /// Configured workload subset in the fixed execution order.
    pub fn selected_workloads(&self) -> Vec<Workload> {
        Workload::ALL
            .into_iter()
            .filter(|workload| self.workloads.is_empty() || self.workloads.contains(workload))
            .collect()
    }
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("dev", "wattbench", "Wattbench")
        .context("Unable to resolve platform data directory")
}

/// Compute the default path to the campaign configuration file.
pub fn default_config_path() -> Result<PathBuf> {
    let dirs = project_dirs()?;
    Ok(dirs.config_dir().join("config.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_survive_a_json_round_trip() {
        let settings = CampaignSettings::default();
        let raw = serde_json::to_string(&settings).unwrap();
        let parsed: CampaignSettings = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.duration_secs, 60);
        assert_eq!(parsed.sample_interval_secs, 1);
        assert_eq!(parsed.iterations, 5);
        assert_eq!(parsed.server_port, 8000);
        assert!(parsed.workloads.is_empty());
    }

    #[test]
    fn empty_config_file_falls_back_to_defaults() {
        let parsed: CampaignSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed.duration_secs, 60);
        assert_eq!(parsed.tab_count, 10);
        assert_eq!(parsed.video_files, vec!["test_VP9.webm".to_string()]);
    }

    #[test]
    fn load_or_default_creates_the_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.json");
        let settings = CampaignSettings::load_or_default(&path).unwrap();
        assert!(path.exists());
        assert_eq!(settings.iterations, 5);
    }

    #[test]
    fn selected_workloads_preserves_fixed_order() {
        let settings = CampaignSettings {
            workloads: vec![Workload::MultipleTabs, Workload::Video],
            ..CampaignSettings::default()
        };
        assert_eq!(
            settings.selected_workloads(),
            vec![Workload::Video, Workload::MultipleTabs]
        );
    }

    #[test]
    fn empty_subset_selects_every_workload() {
        let settings = CampaignSettings::default();
        assert_eq!(settings.selected_workloads(), Workload::ALL.to_vec());
    }

    #[test]
    fn workload_labels_match_artifact_names() {
        assert_eq!(Workload::JsComputation.label(), "js_computation");
        assert_eq!(Workload::MultipleTabs.label(), "multiple_tabs");
        assert_eq!(Workload::Video.page_path(), Some("/video.html"));
        assert_eq!(Workload::Webpage.page_path(), None);
    }
}
