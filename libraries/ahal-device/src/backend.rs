// ahal-device/src/backend.rs
//
// Backend strategies (ALSA-style PCM and DSP graph) and the factory that
// selects between them

use std::sync::Arc;

use ahal_core::{
    BackendFactory, BackendKind, DeviceAttributes, DeviceBackend, HalError, MediaConfig,
    ResourceManager, Result,
};
use tracing::{debug, info};

/// Phase of a backend strategy; both strategies share the same ordering rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Closed,
    Opened,
    Prepared,
    Running,
}

impl Phase {
    /// Check that `operation` is legal from the current phase
    fn require(self, operation: &str, allowed: &[Phase]) -> Result<()> {
        if allowed.contains(&self) {
            Ok(())
        } else {
            Err(HalError::invalid_state(format!(
                "{operation} not allowed while {self:?}"
            )))
        }
    }
}

// Status the PCM layer reports for rejected hardware parameters.
const EINVAL: i32 = 22;

fn check_config(config: &MediaConfig) -> Result<()> {
    if config.sample_rate == 0 || config.ch_info.channels == 0 {
        return Err(HalError::unsupported(format!(
            "media config {}Hz/{}ch",
            config.sample_rate, config.ch_info.channels
        )));
    }
    Ok(())
}

/// Direct PCM programming
///
/// Opens the PCM named by the resource manager and sizes its period from the
/// device's media config.
#[derive(Debug)]
pub struct AlsaBackend {
    phase: Phase,
    pcm_name: Option<String>,
    period_frames: u32,
}

impl AlsaBackend {
    /// Period length used to size the PCM buffer
    pub const PERIOD_MS: u32 = 5;

    pub fn new() -> Self {
        Self {
            phase: Phase::Closed,
            pcm_name: None,
            period_frames: 0,
        }
    }

    /// Name of the opened PCM
    pub fn pcm_name(&self) -> Option<&str> {
        self.pcm_name.as_deref()
    }

    pub fn period_frames(&self) -> u32 {
        self.period_frames
    }

    /// Frames in one period at `sample_rate`
    fn period_for(sample_rate: u32) -> Result<u32> {
        let frames = u64::from(sample_rate) * u64::from(Self::PERIOD_MS) / 1000;
        u32::try_from(frames)
            .map_err(|_| HalError::unsupported(format!("period of {frames} frames at {sample_rate}Hz")))
    }
}

impl Default for AlsaBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceBackend for AlsaBackend {
    fn open(
        &mut self,
        attributes: &DeviceAttributes,
        resources: &Arc<dyn ResourceManager>,
    ) -> Result<()> {
        self.phase.require("open", &[Phase::Closed])?;
        check_config(&attributes.config)?;

        let pcm_name = resources.device_name(attributes.id)?;
        let period_frames = Self::period_for(attributes.config.sample_rate)?;
        if period_frames == 0 {
            return Err(HalError::backend("hw_params", -EINVAL));
        }
        self.period_frames = period_frames;
        info!(
            "ALSA: opened PCM '{}' ({}Hz, {} frames/period)",
            pcm_name, attributes.config.sample_rate, self.period_frames
        );

        self.pcm_name = Some(pcm_name);
        self.phase = Phase::Opened;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.phase
            .require("close", &[Phase::Opened, Phase::Prepared])?;
        debug!("ALSA: closing PCM {:?}", self.pcm_name);
        self.pcm_name = None;
        self.phase = Phase::Closed;
        Ok(())
    }

    fn prepare(&mut self) -> Result<()> {
        self.phase
            .require("prepare", &[Phase::Opened, Phase::Prepared])?;
        debug!("ALSA: prepare {:?}", self.pcm_name);
        self.phase = Phase::Prepared;
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        self.phase.require("start", &[Phase::Prepared])?;
        debug!("ALSA: start {:?}", self.pcm_name);
        self.phase = Phase::Running;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.phase.require("stop", &[Phase::Running])?;
        debug!("ALSA: stop {:?}", self.pcm_name);
        // A stopped PCM must be prepared again before the next start.
        self.phase = Phase::Opened;
        Ok(())
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Alsa
    }
}

/// Graph node configuration derived from a device's media config
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphSession {
    pub device_name: String,
    pub sample_rate: u32,
    pub bit_width: u32,
    pub channels: u16,
    pub service_interval_us: u64,
}

/// DSP graph programming
///
/// Builds a graph session for the device on open; prepare and start are
/// forwarded to the graph as a whole.
#[derive(Debug)]
pub struct GraphBackend {
    phase: Phase,
    session: Option<GraphSession>,
}

impl GraphBackend {
    pub fn new() -> Self {
        Self {
            phase: Phase::Closed,
            session: None,
        }
    }

    pub fn session(&self) -> Option<&GraphSession> {
        self.session.as_ref()
    }
}

impl Default for GraphBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceBackend for GraphBackend {
    fn open(
        &mut self,
        attributes: &DeviceAttributes,
        resources: &Arc<dyn ResourceManager>,
    ) -> Result<()> {
        self.phase.require("open", &[Phase::Closed])?;
        let config = &attributes.config;
        check_config(config)?;

        let session = GraphSession {
            device_name: resources.device_name(attributes.id)?,
            sample_rate: config.sample_rate,
            bit_width: config.bit_width,
            channels: config.ch_info.channels,
            service_interval_us: config.service_interval_us,
        };
        info!(
            "Graph: session for '{}' ({}Hz/{}bit/{}ch)",
            session.device_name, session.sample_rate, session.bit_width, session.channels
        );

        self.session = Some(session);
        self.phase = Phase::Opened;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.phase
            .require("close", &[Phase::Opened, Phase::Prepared])?;
        debug!("Graph: tearing down session");
        self.session = None;
        self.phase = Phase::Closed;
        Ok(())
    }

    fn prepare(&mut self) -> Result<()> {
        self.phase
            .require("prepare", &[Phase::Opened, Phase::Prepared])?;
        debug!("Graph: prepare");
        self.phase = Phase::Prepared;
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        self.phase.require("start", &[Phase::Prepared])?;
        debug!("Graph: start");
        self.phase = Phase::Running;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.phase.require("stop", &[Phase::Running])?;
        debug!("Graph: stop");
        self.phase = Phase::Opened;
        Ok(())
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Graph
    }
}

/// Builds the strategy named by the backend switch
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultBackendFactory;

impl BackendFactory for DefaultBackendFactory {
    fn create(&self, kind: BackendKind) -> Result<Box<dyn DeviceBackend>> {
        debug!("Creating {} backend", kind.name());
        Ok(match kind {
            BackendKind::Alsa => Box::new(AlsaBackend::new()),
            BackendKind::Graph => Box::new(GraphBackend::new()),
        })
    }
}
