use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Result, bail};
use tracing::{debug, warn};

/// Battery readout files probed in order of preference.
const BATTERY_READOUTS: [&str; 2] = [
    "/sys/class/power_supply/BAT1/power_now",
    "/sys/class/power_supply/BAT0/power_now",
];

const MICROWATTS_PER_WATT: f64 = 1_000_000.0;

/// Where instantaneous power readings come from, resolved once at startup.
#[derive(Debug, Clone)]
pub enum PowerSource {
    /// Direct µW readout exposed by the kernel battery driver.
    Battery(PathBuf),
    /// No direct readout; `powertop` invoked once per run as a fallback.
    Powertop(PathBuf),
}

impl PowerSource {
    /// Probe for a usable power source. Failing to find one is fatal for
    /// the campaign.
    pub fn detect() -> Result<PowerSource> {
        for candidate in BATTERY_READOUTS {
            let path = Path::new(candidate);
            if path.exists() {
                debug!(path = candidate, "found battery power readout");
                return Ok(PowerSource::Battery(path.to_path_buf()));
            }
        }
        if let Ok(path) = which::which("powertop") {
            debug!(path = %path.display(), "falling back to powertop sampling");
            return Ok(PowerSource::Powertop(path));
        }
        bail!(
            "no method available to measure power; install powertop or run on a laptop with a battery"
        )
    }

    pub fn describe(&self) -> String {
        match self {
            PowerSource::Battery(path) => path.display().to_string(),
            PowerSource::Powertop(path) => format!("powertop at {}", path.display()),
        }
    }

    /// Single instantaneous reading in watts. `None` means the sample is
    /// skipped, never that the run failed; only the battery source yields
    /// a time series.
    pub fn read_watts(&self) -> Option<f64> {
        match self {
            PowerSource::Battery(path) => read_power_file(path),
            PowerSource::Powertop(_) => None,
        }
    }
}

fn read_power_file(path: &Path) -> Option<f64> {
    match fs::read_to_string(path) {
        Ok(raw) => match raw.trim().parse::<u64>() {
            Ok(microwatts) => Some(microwatts as f64 / MICROWATTS_PER_WATT),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "unparseable power reading; skipping sample");
                None
            }
        },
        Err(err) => {
            warn!(path = %path.display(), error = %err, "power readout unavailable; skipping sample");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn battery_with(contents: &str) -> (tempfile::TempDir, PowerSource) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("power_now");
        let mut file = fs::File::create(&path).unwrap();
        write!(file, "{contents}").unwrap();
        (dir, PowerSource::Battery(path))
    }

    #[test]
    fn converts_microwatts_to_watts() {
        let (_dir, source) = battery_with("5000000\n");
        assert_eq!(source.read_watts(), Some(5.0));
    }

    #[test]
    fn fractional_watt_readings_survive_conversion() {
        let (_dir, source) = battery_with("12345678");
        assert_eq!(source.read_watts(), Some(12.345678));
    }

    #[test]
    fn garbage_reading_is_a_skipped_sample() {
        let (_dir, source) = battery_with("not-a-number");
        assert_eq!(source.read_watts(), None);
    }

    #[test]
    fn missing_readout_file_is_a_skipped_sample() {
        let dir = tempfile::tempdir().unwrap();
        let source = PowerSource::Battery(dir.path().join("gone"));
        assert_eq!(source.read_watts(), None);
    }

    #[test]
    fn powertop_source_never_yields_inline_readings() {
        let source = PowerSource::Powertop(PathBuf::from("/usr/sbin/powertop"));
        assert_eq!(source.read_watts(), None);
    }
}
