//! Configuration loading for bgp-mesh.
//!
//! Configuration is loaded from a TOML file (default: `bgp-mesh.toml`).
//! Every section and field has a default, so an empty file is valid.

use bgpmesh_core::routes::AS_PATH_SPAN;
use bgpmesh_core::{CommandTemplate, InventorySettings, Thresholds};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::remote::Credentials;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "bgp-mesh.toml";

/// Root configuration for bgp-mesh.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Provisioning tool.
    pub provision: ProvisionConfig,
    /// Fleet-wide numbering.
    pub fleet: FleetConfig,
    /// Remote sessions.
    pub remote: RemoteConfig,
    /// Readiness wait.
    pub readiness: ReadinessConfig,
    /// Mesh configuration push.
    pub routing: RoutingConfig,
    /// Synthetic route injection.
    pub routes: RoutesConfig,
    /// Performance scenarios.
    pub performance: PerformanceConfig,
    /// PASS/FAIL thresholds.
    pub thresholds: Thresholds,
    /// Report upload.
    pub report: ReportConfig,
}

/// Provisioning tool configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ProvisionConfig {
    /// Directory the tool runs in (default: aws/terraform).
    #[serde(default = "default_working_dir")]
    pub working_dir: PathBuf,
    /// Tool executable (default: terraform).
    #[serde(default = "default_binary")]
    pub binary: String,
    /// Region; zone letters a-f are appended per router (default: us-east-1).
    #[serde(default = "default_region")]
    pub region: String,
}

/// Fleet numbering.
#[derive(Debug, Clone, Deserialize)]
pub struct FleetConfig {
    /// `asn = base_asn + id` (default: 65000).
    #[serde(default = "default_base_asn")]
    pub base_asn: u32,
}

/// Remote session configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
    /// SSH login (default: ubuntu).
    #[serde(default = "default_user")]
    pub user: String,
    /// SSH identity file; a leading `~/` expands to `$HOME` (default: ~/.ssh/bgp-key.pem).
    #[serde(default = "default_key_path")]
    pub key_path: PathBuf,
    /// Bound on each connect, in seconds (default: 10).
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Bound on each upload or command, in seconds (default: 300).
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
}

/// Readiness wait configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ReadinessConfig {
    /// Deadline in seconds (default: 600).
    #[serde(default = "default_readiness_timeout_secs")]
    pub timeout_secs: u64,
    /// Seconds between probe rounds (default: 10).
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

/// Mesh configuration push.
#[derive(Debug, Clone, Deserialize)]
pub struct RoutingConfig {
    /// Remote path of the uploaded configuration (default: /tmp/frr.conf).
    #[serde(default = "default_config_path")]
    pub config_path: String,
    /// Command template run after upload; `{0}` is `config_path`.
    #[serde(default = "default_apply_command")]
    pub apply_command: String,
    /// Executor invocations for configure and inject, retrying only failed routers (default: 1).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

/// Synthetic route injection.
#[derive(Debug, Clone, Deserialize)]
pub struct RoutesConfig {
    /// Routes per router (default: 10000).
    #[serde(default = "default_route_count")]
    pub count: usize,
    /// Remote path of the JSON payload (default: /tmp/routes.json).
    #[serde(default = "default_payload_path")]
    pub payload_path: String,
    /// Remote path of the injector script (default: /tmp/inject_routes.py).
    #[serde(default = "default_script_path")]
    pub script_path: String,
}

/// Performance scenario configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PerformanceConfig {
    /// Lookups performed by the lookup-latency scenario (default: 1000).
    #[serde(default = "default_lookup_samples")]
    pub lookup_samples: usize,
    /// Remote path of the measurement script (default: /tmp/bgp_measure.py).
    #[serde(default = "default_measure_script_path")]
    pub script_path: String,
    /// Convergence command template; `{0}` is `script_path`.
    #[serde(default = "default_convergence_command")]
    pub convergence_command: String,
    /// CPU command template; `{0}` is `script_path`.
    #[serde(default = "default_cpu_command")]
    pub cpu_command: String,
    /// Memory command template; `{0}` is `script_path`.
    #[serde(default = "default_memory_command")]
    pub memory_command: String,
}

/// Where the report goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// Local directory.
    File,
    /// S3 bucket.
    S3,
}

/// Report upload configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    /// Sink kind (default: file).
    #[serde(default = "default_sink")]
    pub sink: SinkKind,
    /// File-sink root (default: reports).
    #[serde(default = "default_report_directory")]
    pub directory: PathBuf,
    /// S3 bucket (default: bgp-prototype-logs).
    #[serde(default = "default_bucket")]
    pub bucket: String,
    /// Key prefix (default: test_results).
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

// Default value functions
fn default_working_dir() -> PathBuf {
    PathBuf::from("aws/terraform")
}

fn default_binary() -> String {
    "terraform".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_base_asn() -> u32 {
    65000
}

fn default_user() -> String {
    "ubuntu".to_string()
}

fn default_key_path() -> PathBuf {
    PathBuf::from("~/.ssh/bgp-key.pem")
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_command_timeout_secs() -> u64 {
    300
}

fn default_readiness_timeout_secs() -> u64 {
    600
}

fn default_poll_interval_secs() -> u64 {
    10
}

fn default_config_path() -> String {
    "/tmp/frr.conf".to_string()
}

fn default_apply_command() -> String {
    "sudo cp {0} /etc/frr/frr.conf && sudo systemctl restart frr".to_string()
}

fn default_max_attempts() -> u32 {
    1
}

fn default_route_count() -> usize {
    10_000
}

fn default_payload_path() -> String {
    "/tmp/routes.json".to_string()
}

fn default_script_path() -> String {
    "/tmp/inject_routes.py".to_string()
}

fn default_lookup_samples() -> usize {
    1000
}

fn default_measure_script_path() -> String {
    "/tmp/bgp_measure.py".to_string()
}

fn default_convergence_command() -> String {
    "python3 {0} convergence".to_string()
}

fn default_cpu_command() -> String {
    "python3 {0} cpu".to_string()
}

fn default_memory_command() -> String {
    "python3 {0} memory".to_string()
}

fn default_sink() -> SinkKind {
    SinkKind::File
}

fn default_report_directory() -> PathBuf {
    PathBuf::from("reports")
}

fn default_bucket() -> String {
    "bgp-prototype-logs".to_string()
}

fn default_key_prefix() -> String {
    "test_results".to_string()
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            working_dir: default_working_dir(),
            binary: default_binary(),
            region: default_region(),
        }
    }
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            base_asn: default_base_asn(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            user: default_user(),
            key_path: default_key_path(),
            connect_timeout_secs: default_connect_timeout_secs(),
            command_timeout_secs: default_command_timeout_secs(),
        }
    }
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_readiness_timeout_secs(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            config_path: default_config_path(),
            apply_command: default_apply_command(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            count: default_route_count(),
            payload_path: default_payload_path(),
            script_path: default_script_path(),
        }
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            lookup_samples: default_lookup_samples(),
            script_path: default_measure_script_path(),
            convergence_command: default_convergence_command(),
            cpu_command: default_cpu_command(),
            memory_command: default_memory_command(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            sink: default_sink(),
            directory: default_report_directory(),
            bucket: default_bucket(),
            key_prefix: default_key_prefix(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given; otherwise `bgp-mesh.toml` when present, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))
            }
            None => Ok(Self::default()),
        }
    }

    /// Reject values that would make the pipeline misbehave.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fleet.base_asn.checked_add(AS_PATH_SPAN).is_none() {
            return Err(ConfigError::Invalid(format!(
                "fleet.base_asn must be at most {}",
                u32::MAX - AS_PATH_SPAN
            )));
        }
        if self.readiness.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "readiness.timeout_secs must be at least 1".into(),
            ));
        }
        if self.readiness.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "readiness.poll_interval_secs must be at least 1".into(),
            ));
        }
        if self.routing.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "routing.max_attempts must be at least 1".into(),
            ));
        }
        if self.remote.connect_timeout_secs == 0 || self.remote.command_timeout_secs == 0 {
            return Err(ConfigError::Invalid("remote timeouts must be at least 1".into()));
        }
        for (field, template) in [
            ("routing.apply_command", &self.routing.apply_command),
            ("performance.convergence_command", &self.performance.convergence_command),
            ("performance.cpu_command", &self.performance.cpu_command),
            ("performance.memory_command", &self.performance.memory_command),
        ] {
            CommandTemplate::parse(template)
                .map_err(|e| ConfigError::Invalid(format!("{field}: {e}")))?;
        }
        Ok(())
    }

    /// Settings used to turn provisioning output into router records.
    pub fn inventory_settings(&self) -> InventorySettings {
        InventorySettings {
            base_asn: self.fleet.base_asn,
            region: self.provision.region.clone(),
        }
    }

    /// SSH login material with `~/` expanded.
    pub fn credentials(&self) -> Credentials {
        Credentials {
            user: self.remote.user.clone(),
            key_path: expand_home(&self.remote.key_path),
        }
    }
}

impl RemoteConfig {
    /// Connect bound.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Upload/command bound.
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

impl ReadinessConfig {
    /// Readiness deadline.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Pause between probe rounds.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), std::env::var_os("HOME")) {
        (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => path.to_path_buf(),
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// A value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.provision.working_dir, PathBuf::from("aws/terraform"));
        assert_eq!(config.fleet.base_asn, 65000);
        assert_eq!(config.remote.user, "ubuntu");
        assert_eq!(config.remote.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.readiness.timeout(), Duration::from_secs(600));
        assert_eq!(config.readiness.poll_interval(), Duration::from_secs(10));
        assert_eq!(config.routes.count, 10_000);
        assert_eq!(config.routing.max_attempts, 1);
        assert_eq!(config.report.sink, SinkKind::File);
        assert_eq!(config.report.bucket, "bgp-prototype-logs");
        assert_eq!(config.thresholds, Thresholds::default());
        config.validate().unwrap();
    }

    #[test]
    fn empty_file_is_all_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.routing.config_path, "/tmp/frr.conf");
        assert_eq!(config.performance.lookup_samples, 1000);
    }

    #[test]
    fn config_from_toml_string() {
        let toml = r#"
[provision]
region = "eu-west-1"

[fleet]
base_asn = 64512

[remote]
user = "admin"
key_path = "/keys/lab.pem"

[readiness]
timeout_secs = 120
poll_interval_secs = 5

[routes]
count = 500

[thresholds]
cpu_ceiling_percent = 70.0

[report]
sink = "s3"
bucket = "lab-results"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.provision.region, "eu-west-1");
        assert_eq!(config.provision.binary, "terraform");
        assert_eq!(config.fleet.base_asn, 64512);
        assert_eq!(config.credentials().key_path, PathBuf::from("/keys/lab.pem"));
        assert_eq!(config.readiness.timeout_secs, 120);
        assert_eq!(config.routes.count, 500);
        assert_eq!(config.thresholds.cpu_ceiling_percent, 70.0);
        assert_eq!(config.thresholds.memory_ceiling_mb, 200.0);
        assert_eq!(config.report.sink, SinkKind::S3);
        assert_eq!(config.inventory_settings().region, "eu-west-1");
    }

    #[test]
    fn unknown_sink_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bgp-mesh.toml");
        std::fs::write(&path, "[report]\nsink = \"ftp\"\n").unwrap();
        assert!(matches!(
            Config::from_file(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Config::load(Some(&dir.path().join("absent.toml"))),
            Err(ConfigError::ReadError { .. })
        ));
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bgp-mesh.toml");
        std::fs::write(&path, "[readiness]\npoll_interval_secs = 0\n").unwrap();
        assert!(matches!(Config::from_file(&path), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn zero_readiness_timeout_is_rejected() {
        let mut config = Config::default();
        config.readiness.timeout_secs = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid(ref m)) if m.contains("readiness.timeout_secs")
        ));
    }

    #[test]
    fn base_asn_without_headroom_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bgp-mesh.toml");
        std::fs::write(&path, format!("[fleet]\nbase_asn = {}\n", u32::MAX - 4)).unwrap();
        assert!(matches!(
            Config::from_file(&path),
            Err(ConfigError::Invalid(ref m)) if m.contains("fleet.base_asn")
        ));

        let mut config = Config::default();
        config.fleet.base_asn = u32::MAX - AS_PATH_SPAN;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn malformed_template_is_rejected() {
        let mut config = Config::default();
        config.routing.apply_command = "cp {0 /etc/frr".into();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn home_is_expanded() {
        if let Some(home) = std::env::var_os("HOME") {
            let creds = Config::default().credentials();
            assert_eq!(creds.key_path, PathBuf::from(home).join(".ssh/bgp-key.pem"));
        }
    }
}
