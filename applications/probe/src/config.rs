/// Probe configuration
use crate::error::{ProbeError, Result};
use ahal_core::{BackendKind, DeviceId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Config file picked up from the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "ahal.toml";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProbeConfig {
    /// Process-wide backend switch
    #[serde(default)]
    pub backend: BackendKind,

    /// Root of the procfs card tree holding `card<N>/stream<D>` descriptors
    #[serde(default = "default_capability_root")]
    pub capability_root: PathBuf,

    /// Device id -> backend (mixer path) name
    #[serde(default = "default_device_names")]
    pub device_names: BTreeMap<String, String>,

    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

impl ProbeConfig {
    /// Load configuration from file and environment
    ///
    /// `path` must exist when given; otherwise `ahal.toml` is read if present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        match path {
            Some(path) => {
                settings = settings.add_source(config::File::from(path.to_path_buf()));
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    settings = settings.add_source(config::File::from(default_path));
                }
            }
        }

        // Override with environment variables (AHAL_BACKEND, AHAL_DEVICE_NAMES__OUT_SPEAKER)
        settings = settings.add_source(
            config::Environment::with_prefix("AHAL")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = settings
            .build()
            .map_err(|e| ProbeError::Config(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| ProbeError::Config(e.to_string()))
    }

    /// Parse a TOML document, without environment overrides
    pub fn from_toml(text: &str) -> Result<Self> {
        config::Config::builder()
            .add_source(config::File::from_str(text, config::FileFormat::Toml))
            .build()
            .and_then(config::Config::try_deserialize)
            .map_err(|e| ProbeError::Config(e.to_string()))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        for (id, name) in &self.device_names {
            if DeviceId::from_str(id).is_none() {
                return Err(ProbeError::Config(format!(
                    "unknown device id '{id}' in device_names"
                )));
            }
            if name.trim().is_empty() {
                return Err(ProbeError::Config(format!(
                    "device_names.{id} must not be empty"
                )));
            }
        }

        if self.log_filter.trim().is_empty() {
            return Err(ProbeError::Config("log_filter must not be empty".to_string()));
        }

        Ok(())
    }

    /// Names keyed by device id: built-in names overlaid with configured ones
    pub fn device_name_table(&self) -> BTreeMap<DeviceId, String> {
        default_device_names()
            .iter()
            .chain(&self.device_names)
            .filter_map(|(id, name)| DeviceId::from_str(id).map(|id| (id, name.clone())))
            .collect()
    }
}

// Default values
fn default_capability_root() -> PathBuf {
    PathBuf::from(ahal_usb::reader::DEFAULT_PROCFS_ROOT)
}

fn default_device_names() -> BTreeMap<String, String> {
    [
        (DeviceId::OutSpeaker, "speaker"),
        (DeviceId::OutUsbDevice, "usb-device"),
        (DeviceId::OutUsbHeadset, "usb-headset"),
        (DeviceId::InSpeakerMic, "speaker-mic"),
        (DeviceId::InHandsetMic, "handset-mic"),
        (DeviceId::InTriMic, "three-mic"),
        (DeviceId::InQuadMic, "quad-mic"),
        (DeviceId::InEightMic, "eight-mic"),
        (DeviceId::InUsbDevice, "usb-device-mic"),
        (DeviceId::InUsbHeadset, "usb-headset-mic"),
    ]
    .into_iter()
    .map(|(id, name)| (id.as_str().to_string(), name.to_string()))
    .collect()
}

fn default_log_filter() -> String {
    "ahal_probe=info,ahal_device=info,ahal_usb=info".to_string()
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            capability_root: default_capability_root(),
            device_names: default_device_names(),
            log_filter: default_log_filter(),
        }
    }
}
