use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::errors::RtmpSessionResult;

const MAX_CHUNK_SIZE: u32 = 0xFFFFFF;
const MAX_COMPRESSION_LEVEL: u32 = 9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RtmpSessionConfig {
    /// Outbound chunk size announced right after the session starts.
    pub chunk_size: u32,
    /// Acknowledgement window announced to the peer.
    pub window_ack_size: u32,
    /// 0 disables the read timeout.
    pub read_timeout_ms: u64,
    /// 0 disables the write timeout.
    pub write_timeout_ms: u64,
    pub zlib: bool,
    pub compression_level: u32,
    pub object_encoding: amf::Version,
}

impl Default for RtmpSessionConfig {
    fn default() -> Self {
        Self {
            chunk_size: 4096,
            window_ack_size: 2_500_000,
            read_timeout_ms: 0,
            write_timeout_ms: 10_000,
            zlib: false,
            compression_level: 6,
            object_encoding: amf::Version::Amf0,
        }
    }
}

impl RtmpSessionConfig {
    /// Defaults, overridden by the optional file, then by `RTMP_*` environment variables.
    pub fn load(path: Option<&str>) -> RtmpSessionResult<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path));
        }
        let result = builder
            .add_source(Environment::with_prefix("RTMP").try_parsing(true))
            .build()?;
        let config: Self = result.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> RtmpSessionResult<()> {
        if !(1..=MAX_CHUNK_SIZE).contains(&self.chunk_size) {
            return Err(ConfigError::Message(format!(
                "chunk_size out of range: {}",
                self.chunk_size
            ))
            .into());
        }
        if !(1..=i32::MAX as u32).contains(&self.window_ack_size) {
            return Err(ConfigError::Message(format!(
                "window_ack_size out of range: {}",
                self.window_ack_size
            ))
            .into());
        }
        if self.compression_level > MAX_COMPRESSION_LEVEL {
            return Err(ConfigError::Message(format!(
                "compression_level out of range: {}",
                self.compression_level
            ))
            .into());
        }
        Ok(())
    }
}
