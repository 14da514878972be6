mod audio;
mod device;

pub use audio::{ChannelInfo, ChannelMask, ChannelPosition, Direction, MediaConfig, PcmFormat};
pub use device::{
    BackendKind, DeviceAddress, DeviceAttributes, DeviceId, StreamAttributes, StreamHandle,
};
