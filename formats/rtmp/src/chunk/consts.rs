/// Largest value of the 24-bit timestamp field, signals an extended timestamp.
pub const MAX_TIMESTAMP: u32 = 0xFFFFFF;
pub const MAX_MESSAGE_LENGTH: usize = 0xFFFFFF;
pub const DEFAULT_CHUNK_SIZE: usize = 128;

pub mod csid {
    use crate::protocol_control::consts::PROTOCOL_CONTROL_CSID;

    pub const PROTOCOL_CONTROL: u8 = PROTOCOL_CONTROL_CSID;
    pub const USER_CONTROL: u8 = PROTOCOL_CONTROL_CSID;
    pub const NET_CONNECTION_COMMAND: u8 = 0x03;
    pub const DATA: u8 = 0x04;
    pub const AUDIO: u8 = 0x06;
    pub const VIDEO: u8 = 0x07;

    pub const MIN: u32 = 2;
    pub const MAX: u32 = 65599;
}
