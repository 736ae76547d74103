//! Config file discovery and resolution

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use poselink_core::{PoseLinkError, PoseLinkResult};

use crate::{parse_config, ConfigSource, SessionConfig};

/// Config file name looked up in every candidate directory
pub const CONFIG_FILE_NAME: &str = "poselink_config.txt";

/// Environment variable overriding the writable data directory
pub const DATA_DIR_ENV: &str = "POSELINK_DATA_DIR";

/// Platform class, decides search order
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Platform {
    /// Desktop: files next to the install take precedence
    Desktop,
    /// Headsets and phones: the install directory is read-only, the data
    /// directory is searched first
    Constrained,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(any(target_os = "android", target_os = "ios")) {
            Platform::Constrained
        } else {
            Platform::Desktop
        }
    }
}

/// Resolver options
#[derive(Clone, Debug)]
pub struct ResolverOptions {
    /// Look for (and create) an external config file at all
    pub use_external_config: bool,
    pub file_name: String,
    pub platform: Platform,
    /// Writable per-user data directory
    pub data_dir: Option<PathBuf>,
    /// Directory holding the executable
    pub install_dir: Option<PathBuf>,
    /// Base layer
    pub defaults: SessionConfig,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        ResolverOptions {
            use_external_config: true,
            file_name: CONFIG_FILE_NAME.to_string(),
            platform: Platform::current(),
            data_dir: None,
            install_dir: None,
            defaults: SessionConfig::default(),
        }
    }
}

impl ResolverOptions {
    /// Options with directories derived from the running process
    pub fn for_current_platform() -> Self {
        ResolverOptions {
            data_dir: default_data_dir(),
            install_dir: std::env::current_exe()
                .ok()
                .and_then(|exe| exe.parent().map(Path::to_path_buf)),
            ..Self::default()
        }
    }

    /// Options that never touch the filesystem
    pub fn defaults_only() -> Self {
        ResolverOptions {
            use_external_config: false,
            ..Self::default()
        }
    }

    /// Candidate config paths, most preferred first
    pub fn candidate_paths(&self) -> Vec<PathBuf> {
        let dirs = match self.platform {
            Platform::Constrained => [&self.data_dir, &self.install_dir],
            Platform::Desktop => [&self.install_dir, &self.data_dir],
        };

        dirs.into_iter()
            .flatten()
            .map(|dir| dir.join(&self.file_name))
            .collect()
    }
}

fn default_data_dir() -> Option<PathBuf> {
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV) {
        return Some(PathBuf::from(dir));
    }
    if let Some(dir) = std::env::var_os("XDG_DATA_HOME") {
        return Some(PathBuf::from(dir).join("poselink"));
    }
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".local/share/poselink"))
}

/// Commented template written when no config file exists.
///
/// The one active line is the default target, so reading the template back
/// resolves to the defaults.
pub fn config_template(defaults: &SessionConfig) -> String {
    format!(
        "# PoseLink network configuration\n\
         #\n\
         # One directive per line. Lines starting with '#' are ignored.\n\
         # A bare IPv4 address sets the telemetry target, or use keys:\n\
         #\n\
         # target_ip=192.168.1.20\n\
         # send_port={port}\n\
         # send_interval={interval}\n\
         # receive_port={receive}\n\
         \n\
         {target}\n",
        port = defaults.send_port,
        interval = defaults.send_interval.as_secs_f64(),
        receive = defaults.receive_port,
        target = defaults.target_address,
    )
}

/// Resolves the effective [`SessionConfig`]
#[derive(Clone, Debug)]
pub struct ConfigResolver {
    options: ResolverOptions,
}

impl ConfigResolver {
    pub fn new(options: ResolverOptions) -> Self {
        ConfigResolver { options }
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    /// First existing candidate path
    pub fn locate(&self) -> Option<PathBuf> {
        self.options
            .candidate_paths()
            .into_iter()
            .find(|path| path.is_file())
    }

    /// Write the template at `path`, creating parent directories
    pub fn write_template(&self, path: &Path) -> PoseLinkResult<()> {
        let io_err = |e: io::Error| PoseLinkError::ConfigIo {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(path, config_template(&self.options.defaults)).map_err(io_err)
    }

    /// Read and layer a config file over the defaults
    pub fn load(&self, path: &Path) -> PoseLinkResult<SessionConfig> {
        let text = fs::read_to_string(path).map_err(|e| PoseLinkError::ConfigIo {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let parsed = parse_config(&text);
        for skipped in &parsed.skipped {
            tracing::debug!(path = %path.display(), "skipping config line: {}", skipped);
        }

        Ok(parsed.overrides.apply(self.options.defaults.clone()))
    }

    /// Resolve the effective configuration. Never fails.
    pub fn resolve(&self) -> SessionConfig {
        let defaults = self.options.defaults.clone();

        if !self.options.use_external_config {
            return defaults;
        }

        let Some(path) = self.locate() else {
            self.synthesize_template();
            return defaults;
        };

        match self.load(&path) {
            Ok(config) => {
                tracing::info!(
                    path = %path.display(),
                    target = %config.target(),
                    interval_ms = config.send_interval.as_millis() as u64,
                    "loaded telemetry config"
                );
                config
            }
            Err(e) => {
                tracing::warn!("{}; using defaults", e);
                defaults
            }
        }
    }

    fn synthesize_template(&self) {
        let Some(primary) = self.options.candidate_paths().into_iter().next() else {
            tracing::debug!("no config directories known; using defaults");
            return;
        };

        match self.write_template(&primary) {
            Ok(()) => tracing::info!(path = %primary.display(), "wrote config template"),
            Err(e) => tracing::warn!("cannot write config template: {}", e),
        }
    }
}

impl ConfigSource for ConfigResolver {
    fn resolve(&self) -> SessionConfig {
        ConfigResolver::resolve(self)
    }
}
