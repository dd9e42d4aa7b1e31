//! Configuration management for the accel-tablet-moded daemon.
//!
//! The configuration file is optional: every field has a built-in default
//! matching the supported laptops, so the daemon runs without one.

use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use crate::{accel_sensors::iio::Platform, input::uinput::SwitchIdentity};

/// Environment variable naming a configuration file.
pub const CONFIG_ENV: &str = "ACCEL_TABLET_MODED_CONFIG";

const CONFIG_SUBPATH: &str = "accel-tablet-moded/config.yml";
const ETC_CONFIG: &str = "/etc/accel-tablet-moded/config.yml";

/// uinput device names are 80 bytes including the terminating NUL.
const MAX_SWITCH_NAME: usize = 79;

/// Longest single wait `poll(2)` accepts through the lid reader.
const MAX_POLL_TIMEOUT_MS: u64 = u16::MAX as u64;

/// Main configuration structure.
///
/// # Example
///
/// ```yaml
/// version: 1
/// poll_timeout_ms: 1000
/// lid_device: "Lid Switch"
/// query_initial_lid_state: true
/// virtual_switch:
///   name: "Accelerometer Tablet Mode Virtual Switch"
///   vendor: 0x1234
///   product: 0x5678
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Configuration version for compatibility checking.
    #[serde(default = "defaults::version")]
    pub version: u8,

    /// Upper bound of one wait on the lid switch, in milliseconds.
    #[serde(default = "defaults::poll_timeout_ms")]
    pub poll_timeout_ms: u64,

    /// Time given to the kernel to bind a freshly enabled accelerometer.
    #[serde(default = "defaults::settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Declared evdev name of the lid switch.
    #[serde(default = "defaults::lid_device")]
    pub lid_device: String,

    #[serde(default = "defaults::input_dir")]
    pub input_dir: PathBuf,

    #[serde(default = "defaults::sysfs_root")]
    pub sysfs_root: PathBuf,

    /// Ask the kernel for the lid state at startup instead of assuming open.
    #[serde(default)]
    pub query_initial_lid_state: bool,

    /// Identity of the virtual tablet-mode switch.
    #[serde(default)]
    pub virtual_switch: SwitchCfg,
}

/// Virtual switch identity as written in the configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwitchCfg {
    pub name: String,
    pub vendor: u16,
    pub product: u16,
    pub version: u16,
}

impl Default for SwitchCfg {
    fn default() -> Self {
        let SwitchIdentity {
            name,
            vendor,
            product,
            version,
        } = SwitchIdentity::default();
        Self {
            name,
            vendor,
            product,
            version,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: defaults::version(),
            poll_timeout_ms: defaults::poll_timeout_ms(),
            settle_delay_ms: defaults::settle_delay_ms(),
            lid_device: defaults::lid_device(),
            input_dir: defaults::input_dir(),
            sysfs_root: defaults::sysfs_root(),
            query_initial_lid_state: false,
            virtual_switch: SwitchCfg::default(),
        }
    }
}

impl Config {
    /// Validates the configuration for consistency.
    ///
    /// # Example
    ///
    /// ```
    /// use accel_tablet_moded::config::Config;
    ///
    /// let config = Config::default();
    /// config.validate()?;
    /// # Ok::<(), anyhow::Error>(())
    /// ```
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            anyhow::bail!("Unsupported config version {}", self.version);
        }
        if self.poll_timeout_ms == 0 {
            anyhow::bail!("poll_timeout_ms must be greater than zero");
        }
        if self.poll_timeout_ms > MAX_POLL_TIMEOUT_MS {
            anyhow::bail!(
                "poll_timeout_ms is {}, at most {MAX_POLL_TIMEOUT_MS} is allowed",
                self.poll_timeout_ms
            );
        }
        if self.lid_device.trim().is_empty() {
            anyhow::bail!("lid_device cannot be empty");
        }
        if self.virtual_switch.name.len() > MAX_SWITCH_NAME {
            anyhow::bail!(
                "virtual_switch.name is {} bytes long, at most {MAX_SWITCH_NAME} are allowed",
                self.virtual_switch.name.len()
            );
        }
        Ok(())
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Sysfs view used by the device profiles.
    pub fn platform(&self) -> Platform {
        Platform::new(self.sysfs_root.clone(), self.settle_delay())
    }

    pub fn switch_identity(&self) -> SwitchIdentity {
        SwitchIdentity {
            name: self.virtual_switch.name.clone(),
            vendor: self.virtual_switch.vendor,
            product: self.virtual_switch.product,
            version: self.virtual_switch.version,
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    pub fn version() -> u8 {
        1
    }

    pub fn poll_timeout_ms() -> u64 {
        1000
    }

    pub fn settle_delay_ms() -> u64 {
        1000
    }

    pub fn lid_device() -> String {
        "Lid Switch".into()
    }

    pub fn input_dir() -> PathBuf {
        PathBuf::from("/dev/input")
    }

    pub fn sysfs_root() -> PathBuf {
        PathBuf::from("/sys")
    }
}

fn locate_config() -> Option<PathBuf> {
    let config_home = env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("HOME").map(|h| Path::new(&h).join(".config")));
    locate_config_in(
        env::var_os(CONFIG_ENV).map(PathBuf::from),
        config_home,
        Path::new(ETC_CONFIG),
    )
}

fn locate_config_in(
    env_path: Option<PathBuf>,
    config_home: Option<PathBuf>,
    etc: &Path,
) -> Option<PathBuf> {
    // 1) ENV, taken as is
    if env_path.is_some() {
        return env_path;
    }

    // 2) XDG_CONFIG_HOME or $HOME/.config
    if let Some(path) = config_home.map(|dir| dir.join(CONFIG_SUBPATH)) {
        if path.exists() {
            return Some(path);
        }
    }

    // 3) /etc
    etc.exists().then(|| etc.to_path_buf())
}

/// Read-only configuration handle shared with the application.
///
/// # Example
///
/// ```no_run
/// use accel_tablet_moded::config::ConfigManager;
/// use std::path::PathBuf;
///
/// # async fn example() -> anyhow::Result<()> {
/// // Load from specific path
/// let config_manager = ConfigManager::load(Some(PathBuf::from("config.yml"))).await?;
///
/// // Load from standard locations, falling back to defaults
/// let config_manager = ConfigManager::load(None).await?;
///
/// let timeout = config_manager.get().poll_timeout();
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: Arc<Config>,
    path: Option<PathBuf>,
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new(Config::default(), None)
    }
}

impl ConfigManager {
    pub fn new(config: Config, path: Option<PathBuf>) -> Self {
        Self {
            config: Arc::new(config),
            path,
        }
    }

    /// Loads configuration from file or standard locations.
    ///
    /// Searches for configuration in the following order:
    /// 1. Provided path parameter
    /// 2. ACCEL_TABLET_MODED_CONFIG environment variable
    /// 3. XDG_CONFIG_HOME/accel-tablet-moded/config.yml or ~/.config/accel-tablet-moded/config.yml
    /// 4. /etc/accel-tablet-moded/config.yml
    ///
    /// An explicitly named file must exist. When nothing is found in the
    /// standard locations the built-in defaults are used.
    pub async fn load(path: Option<PathBuf>) -> Result<Self> {
        let Some(config_path) = path.or_else(locate_config) else {
            info!("No config file found, using built-in defaults");
            return Ok(Self::default());
        };

        info!("Loading config from: {}", config_path.display());
        let config = Self::load_config_from_path(&config_path).await?;

        Ok(Self::new(config, Some(config_path)))
    }

    /// Gets a read-only reference to the configuration.
    pub fn get(&self) -> &Config {
        &self.config
    }

    /// Returns the path the configuration was loaded from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    async fn load_config_from_path(path: &Path) -> Result<Config> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        // An empty file is a valid, all-default configuration.
        let config: Config = if content.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML in: {}", path.display()))?
        };

        config
            .validate()
            .with_context(|| format!("Configuration validation failed for: {}", path.display()))?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    // Helper function to create temporary config file
    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();
        temp_file.flush().unwrap();
        temp_file
    }

    fn load(path: &Path) -> Result<ConfigManager> {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(ConfigManager::load(Some(path.to_path_buf())))
    }

    #[test]
    fn config_load_valid_yaml() {
        let yaml_content = r#"
version: 1
poll_timeout_ms: 250
settle_delay_ms: 2000
lid_device: "LID0"
input_dir: "/tmp/input"
query_initial_lid_state: true
virtual_switch:
  name: "Test Switch"
  vendor: 0x1d6b
"#;

        let temp_file = create_temp_config(yaml_content);
        let config_manager = load(temp_file.path()).unwrap();
        let config = config_manager.get();

        assert_eq!(config_manager.path(), Some(temp_file.path()));
        assert_eq!(config.poll_timeout(), Duration::from_millis(250));
        assert_eq!(config.settle_delay(), Duration::from_secs(2));
        assert_eq!(config.lid_device, "LID0");
        assert_eq!(config.input_dir, PathBuf::from("/tmp/input"));
        assert!(config.query_initial_lid_state);

        let identity = config.switch_identity();
        assert_eq!(identity.name, "Test Switch");
        assert_eq!(identity.vendor, 0x1d6b);
        assert_eq!(identity.product, 0x5678);
        assert_eq!(identity.version, 1);
    }

    #[test]
    fn empty_file_means_defaults() {
        let temp_file = create_temp_config("\n");
        let config_manager = load(temp_file.path()).unwrap();
        assert_eq!(config_manager.get(), &Config::default());
    }

    #[test]
    fn defaults_match_the_supported_hardware() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.poll_timeout(), Duration::from_secs(1));
        assert_eq!(config.lid_device, "Lid Switch");
        assert_eq!(config.switch_identity(), SwitchIdentity::default());
        assert!(!config.query_initial_lid_state);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let err = load(Path::new("/nonexistent/accel-tablet-moded.yml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let temp_file = create_temp_config("version: 2\n");
        let err = load(temp_file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("Unsupported config version 2"));
    }

    #[test]
    fn malformed_yaml_is_rejected() {
        let temp_file = create_temp_config("poll_timeout_ms: [1, 2]\n");
        let err = load(temp_file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse YAML"));
    }

    #[test]
    fn config_validate_rejects_bad_values() {
        let config = Config {
            poll_timeout_ms: 0,
            ..Config::default()
        };
        assert!(config.validate().unwrap_err().to_string().contains("poll_timeout_ms"));

        let config = Config {
            lid_device: "  ".into(),
            ..Config::default()
        };
        assert!(config.validate().unwrap_err().to_string().contains("lid_device"));

        let mut config = Config::default();
        config.virtual_switch.name = "n".repeat(80);
        assert!(config.validate().unwrap_err().to_string().contains("79"));
        config.virtual_switch.name = "n".repeat(79);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn poll_timeout_must_fit_one_wait() {
        let config = Config {
            poll_timeout_ms: 65_536,
            ..Config::default()
        };
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("poll_timeout_ms is 65536"), "{err}");

        let config = Config {
            poll_timeout_ms: 65_535,
            ..Config::default()
        };
        assert!(config.validate().is_ok());

        let temp_file = create_temp_config("poll_timeout_ms: 100000\n");
        let err = load(temp_file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("at most 65535"));
    }

    #[test]
    fn locate_prefers_env_then_home_then_etc() {
        let tmp = TempDir::new().unwrap();
        let home = tmp.path().join("home");
        let etc = tmp.path().join("etc.yml");

        // Nothing anywhere.
        assert_eq!(locate_config_in(None, Some(home.clone()), &etc), None);

        fs::write(&etc, "").unwrap();
        assert_eq!(locate_config_in(None, Some(home.clone()), &etc), Some(etc.clone()));

        let user = home.join(CONFIG_SUBPATH);
        fs::create_dir_all(user.parent().unwrap()).unwrap();
        fs::write(&user, "").unwrap();
        assert_eq!(locate_config_in(None, Some(home.clone()), &etc), Some(user));

        // The environment wins even when the file does not exist.
        let env_path = tmp.path().join("missing.yml");
        assert_eq!(
            locate_config_in(Some(env_path.clone()), Some(home), &etc),
            Some(env_path)
        );
    }
}
