use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

type Result<T> = std::result::Result<T, ConfigError>;

fn default_listen_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_jpeg_quality() -> u8 {
    75
}

fn default_static_dir() -> std::path::PathBuf {
    std::path::PathBuf::from("static")
}

/// Selects which `GpioCoprocessor`/`CameraBackend` implementations
/// `finch-server`'s `main` wires up. Feature-gated backends
/// (`pigpio-socket`, `backend-v4l2`) are only reachable when the
/// corresponding cargo feature is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GpioBackendKind {
    Mock,
    PigpioSocket,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraBackendKind {
    Mock,
    V4l2,
}

fn default_gpio_backend() -> GpioBackendKind {
    GpioBackendKind::Mock
}

fn default_camera_backend() -> CameraBackendKind {
    CameraBackendKind::Mock
}

fn default_pigpio_addr() -> String {
    "127.0.0.1:8888".to_string()
}

fn default_v4l2_device() -> String {
    "/dev/video0".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SweepConfig {
    pub t_min: u32,
    pub t_max: u32,
    pub dt: u32,
}

impl Default for SweepConfig {
    fn default() -> Self {
        let t_min = 0;
        let t_max = 2730;
        SweepConfig {
            t_min,
            t_max,
            dt: (t_max - t_min) / 256,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FinchConfig {
    /// Address the HTTP/WebSocket server listens on.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Directory static files (the dashboard, etc.) are served from.
    #[serde(default = "default_static_dir")]
    pub static_dir: std::path::PathBuf,
    #[serde(default = "default_gpio_backend")]
    pub gpio_backend: GpioBackendKind,
    #[serde(default = "default_pigpio_addr")]
    pub pigpio_addr: String,
    #[serde(default = "default_camera_backend")]
    pub camera_backend: CameraBackendKind,
    #[serde(default = "default_v4l2_device")]
    pub v4l2_device: String,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    #[serde(default)]
    pub trigger: finch_protocol::TriggerConfig,
    #[serde(default)]
    pub sweep: SweepConfig,
}

impl Default for FinchConfig {
    fn default() -> Self {
        FinchConfig {
            listen_addr: default_listen_addr(),
            static_dir: default_static_dir(),
            gpio_backend: default_gpio_backend(),
            pigpio_addr: default_pigpio_addr(),
            camera_backend: default_camera_backend(),
            v4l2_device: default_v4l2_device(),
            jpeg_quality: default_jpeg_quality(),
            trigger: finch_protocol::TriggerConfig::default(),
            sweep: SweepConfig::default(),
        }
    }
}

/// `static_dir` may contain a leading `~` or `$VAR` reference (e.g. a
/// config shared between a developer's machine and the instrument's
/// deployment path); expand it the same way the config file's other
/// path-shaped fields would be.
fn expand_static_dir(cfg: &mut FinchConfig) -> Result<()> {
    let pathstr = cfg
        .static_dir
        .to_str()
        .ok_or_else(|| ConfigError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "static_dir is not valid UTF-8",
        )))?;
    let expanded = shellexpand::full(pathstr)?;
    cfg.static_dir = std::path::PathBuf::from(expanded.to_string());
    Ok(())
}

pub fn parse_config_file<P: AsRef<std::path::Path>>(path: P) -> Result<FinchConfig> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    let mut cfg: FinchConfig = toml::from_str(&contents)?;
    expand_static_dir(&mut cfg)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let cfg = FinchConfig::default();
        let text = toml::to_string(&cfg).unwrap();
        let back: FinchConfig = toml::from_str(&text).unwrap();
        assert_eq!(cfg.listen_addr, back.listen_addr);
        assert_eq!(cfg.sweep.dt, back.sweep.dt);
    }

    #[test]
    fn unknown_field_is_rejected() {
        let toml_text = "listen_addr = \"0.0.0.0:9000\"\nbogus_field = 1\n";
        assert!(toml::from_str::<FinchConfig>(toml_text).is_err());
    }

    #[test]
    fn sweep_default_matches_original_instrument_constants() {
        let sweep = SweepConfig::default();
        assert_eq!(sweep.t_min, 0);
        assert_eq!(sweep.t_max, 2730);
        assert_eq!(sweep.dt, 10);
    }

    #[test]
    fn static_dir_env_var_is_expanded() {
        std::env::set_var("FINCH_TEST_STATIC_DIR", "/srv/finch/static");
        let mut cfg = FinchConfig {
            static_dir: std::path::PathBuf::from("$FINCH_TEST_STATIC_DIR/dashboard"),
            ..FinchConfig::default()
        };
        expand_static_dir(&mut cfg).unwrap();
        assert_eq!(
            cfg.static_dir,
            std::path::PathBuf::from("/srv/finch/static/dashboard")
        );
        std::env::remove_var("FINCH_TEST_STATIC_DIR");
    }
}
