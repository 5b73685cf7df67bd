use std::{
    path::PathBuf,
    process::{Child, Command, Stdio},
    thread,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::config::{CampaignSettings, Workload};
use crate::logbook::Logbook;
use crate::power::PowerSource;
use crate::probe::{BrowserFamily, BrowserSpec};
use crate::report::{PowerSample, RunResult};

const TERMINATION_POLL: Duration = Duration::from_millis(100);

/// Optional input-simulation helper (xdotool), resolved once at startup.
/// Used to issue the click that unblocks video autoplay policies.
#[derive(Debug, Clone)]
pub struct InputDriver {
    binary: PathBuf,
}

impl InputDriver {
    pub fn detect() -> Option<InputDriver> {
        which::which("xdotool").ok().map(|binary| Self { binary })
    }

    /// Best-effort click in the middle of the screen; failures are ignored,
    /// the page script remains the fallback.
    fn nudge_playback(&self) {
        let _ = Command::new(&self.binary)
            .args(["mousemove", "50%", "50%"])
            .output();
        let _ = Command::new(&self.binary).args(["click", "1"]).output();
    }
}

/// Materialised launch invocation for one (browser, workload) run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    binary: String,
    args: Vec<String>,
}

impl CommandSpec {
    fn new(binary: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            binary: binary.into(),
            args,
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn to_command(&self) -> Command {
        let mut command = Command::new(&self.binary);
        command.args(&self.args);
        command
    }

    pub fn describe(&self) -> String {
        format!("{} {}", self.binary, self.args.join(" "))
    }
}

/// Build the launch invocation for one (browser, workload) pair. Flags are
/// dispatched over the closed (workload, family) table: Chromium-family
/// browsers take `--start-maximized`, Firefox runs video in kiosk mode, and
/// every family gets the autoplay override for video.
pub fn launch_command(
    browser: &BrowserSpec,
    workload: Workload,
    settings: &CampaignSettings,
) -> CommandSpec {
    let local = |path: &str| format!("{}{}", settings.server_base_url(), path);
    let args: Vec<String> = match workload {
        Workload::Video => {
            let url = local("/video.html");
            match browser.family {
                BrowserFamily::Firefox => vec![
                    "--kiosk".into(),
                    "--autoplay-policy=no-user-gesture-required".into(),
                    url,
                ],
                BrowserFamily::Chromium => vec![
                    "--autoplay-policy=no-user-gesture-required".into(),
                    "--start-maximized".into(),
                    url,
                ],
                BrowserFamily::Other => vec![
                    "--autoplay-policy=no-user-gesture-required".into(),
                    url,
                ],
            }
        }
        Workload::Animation => {
            let url = local("/animation.html");
            match browser.family {
                BrowserFamily::Chromium => vec!["--start-maximized".into(), url],
                _ => vec![url],
            }
        }
        Workload::JsComputation => {
            let url = local("/jscomputation.html");
            match browser.family {
                BrowserFamily::Chromium => vec!["--start-maximized".into(), url],
                _ => vec![url],
            }
        }
        Workload::Webpage => vec![settings.test_url.clone()],
        Workload::MultipleTabs => Vec::new(),
    };
    CommandSpec::new(browser.command, args)
}

/// Scoped process handle: the browser is force-killed on drop if it is
/// still running, so no exit path can leak a measured process into the
/// next run.
#[derive(Debug)]
struct BrowserProcess {
    child: Child,
}

impl BrowserProcess {
    fn spawn(spec: &CommandSpec) -> Result<BrowserProcess> {
        let child = spec
            .to_command()
            .spawn()
            .with_context(|| format!("failed to launch {}", spec.describe()))?;
        Ok(Self { child })
    }

    fn id(&self) -> u32 {
        self.child.id()
    }

    /// Graceful stop, bounded wait, then force-kill.
    fn shutdown(&mut self, grace: Duration) {
        request_graceful_stop(self.id());
        let deadline = Instant::now() + grace;
        while Instant::now() < deadline {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    debug!(pid = self.id(), %status, "browser exited gracefully");
                    return;
                }
                Ok(None) => thread::sleep(TERMINATION_POLL),
                Err(err) => {
                    warn!(pid = self.id(), error = %err, "wait on browser failed");
                    break;
                }
            }
        }
        warn!(pid = self.id(), "browser did not exit within grace period; force-killing");
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl Drop for BrowserProcess {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

#[cfg(unix)]
fn request_graceful_stop(pid: u32) {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;
    let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
}

#[cfg(not(unix))]
fn request_graceful_stop(_pid: u32) {}

/// Kill every process sharing the browser executable name. Covers the tab
/// and window children the spawned handle does not track.
fn kill_stragglers(command: &str) {
    let _ = Command::new("killall")
        .arg(command)
        .stderr(Stdio::null())
        .status();
}

/// Drives one (browser, workload) run: launch, activate, sample, terminate.
pub struct WorkloadDriver<'a> {
    settings: &'a CampaignSettings,
    source: &'a PowerSource,
    input: Option<&'a InputDriver>,
    logbook: &'a Logbook,
}

impl<'a> WorkloadDriver<'a> {
    pub fn new(
        settings: &'a CampaignSettings,
        source: &'a PowerSource,
        input: Option<&'a InputDriver>,
        logbook: &'a Logbook,
    ) -> Self {
        Self {
            settings,
            source,
            input,
            logbook,
        }
    }

    /// Execute one run. Returns `None` when the run failed or produced no
    /// samples; the browser process is terminated on every path.
    pub fn run(&self, browser: &BrowserSpec, workload: Workload) -> Option<RunResult> {
        self.logbook.record(format!(
            "Starting {} test for {}...",
            workload.label(),
            browser.label
        ));

        let command = launch_command(browser, workload, self.settings);
        debug!(command = %command.describe(), "prepared launch command");

        let mut process = match BrowserProcess::spawn(&command) {
            Ok(process) => process,
            Err(err) => {
                self.logbook.record(format!("Error during test: {err:#}"));
                return None;
            }
        };
        self.logbook.record(format!(
            "Started {} with PID {}",
            browser.label,
            process.id()
        ));

        let sampled = self.activate_and_sample(browser, workload);

        self.logbook.record(format!(
            "Test complete. Terminating {}...",
            browser.label
        ));
        process.shutdown(Duration::from_secs(self.settings.grace_secs));
        match &sampled {
            // Child tabs and windows outlive the spawned handle.
            Ok(_) if workload == Workload::MultipleTabs => kill_stragglers(browser.command),
            Err(_) => kill_stragglers(browser.command),
            Ok(_) => {}
        }
        self.logbook.record(format!("{} terminated.", browser.label));

        match sampled {
            Ok(samples) if !samples.is_empty() => {
                let result = RunResult::from_samples(
                    browser.label,
                    workload,
                    samples,
                    self.settings.sample_interval_secs as f64,
                );
                self.logbook
                    .record(format!("Average Power: {:.2}W", result.avg_power));
                self.logbook
                    .record(format!("Max Power: {:.2}W", result.max_power));
                self.logbook
                    .record(format!("Min Power: {:.2}W", result.min_power));
                self.logbook
                    .record(format!("Total Energy: {:.4}Wh", result.total_energy_wh));
                Some(result)
            }
            Ok(_) => {
                self.logbook.record("No power readings collected.");
                None
            }
            Err(err) => {
                self.logbook.record(format!("Error during test: {err:#}"));
                None
            }
        }
    }

    fn activate_and_sample(
        &self,
        browser: &BrowserSpec,
        workload: Workload,
    ) -> Result<Vec<PowerSample>> {
        thread::sleep(Duration::from_secs(self.settings.settle_secs));

        if workload == Workload::Video {
            match self.input {
                Some(input) => {
                    self.logbook
                        .record("Using xdotool to help trigger video autoplay...");
                    input.nudge_playback();
                    thread::sleep(Duration::from_secs(2));
                }
                None => {
                    self.logbook
                        .record("xdotool not available, relying on JavaScript for autoplay");
                }
            }
        }

        if workload == Workload::MultipleTabs {
            for _ in 0..self.settings.tab_count {
                self.open_tab(browser)?;
                thread::sleep(Duration::from_secs(self.settings.tab_open_delay_secs));
            }
        }

        let duration = Duration::from_secs(self.settings.duration_secs);
        match self.source {
            PowerSource::Battery(_) => Ok(self.sample_battery(duration)),
            PowerSource::Powertop(path) => Ok(self.sample_powertop(path.clone(), duration)),
        }
    }

    /// Hand the target URL to the already-running instance; the helper
    /// invocation itself exits quickly.
    fn open_tab(&self, browser: &BrowserSpec) -> Result<()> {
        Command::new(browser.command)
            .arg(&self.settings.test_url)
            .status()
            .with_context(|| format!("failed to open tab in {}", browser.command))?;
        Ok(())
    }

    fn sample_battery(&self, duration: Duration) -> Vec<PowerSample> {
        self.logbook.record(format!(
            "Collecting power data from {} for {} seconds...",
            self.source.describe(),
            self.settings.duration_secs
        ));
        let interval = Duration::from_secs(self.settings.sample_interval_secs);
        let start = Instant::now();
        let mut samples = Vec::new();
        while start.elapsed() < duration {
            let elapsed_secs = start.elapsed().as_secs_f64();
            if let Some(watts) = self.source.read_watts() {
                samples.push(PowerSample {
                    elapsed_secs,
                    watts,
                });
                self.logbook
                    .record(format!("Time: {elapsed_secs:.1}s, Power: {watts:.2}W"));
            }
            thread::sleep(interval);
        }
        samples
    }

    /// Fallback when no direct readout exists: sleep through the workload,
    /// then run powertop once. The utility's report is not parsed; the run
    /// is marked by a single zero-valued sample and yields no real time
    /// series. Known limitation carried over from the original fallback.
    fn sample_powertop(&self, powertop: PathBuf, duration: Duration) -> Vec<PowerSample> {
        self.logbook
            .record("No direct power readings available. Using powertop...");
        thread::sleep(duration);

        let report = std::env::temp_dir().join("powertop.csv");
        let output = Command::new(powertop)
            .arg(format!("--csv={}", report.display()))
            .arg("--time=5")
            .output();
        match output {
            Ok(_) => {
                self.logbook.record("Powertop data collected.");
                vec![PowerSample {
                    elapsed_secs: 0.0,
                    watts: 0.0,
                }]
            }
            Err(err) => {
                self.logbook
                    .record(format!("Error running powertop: {err}"));
                Vec::new()
            }
        }
    }
}
