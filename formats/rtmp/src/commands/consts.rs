// @see: 7.2.1. NetConnection Commands
pub mod c2s_command_names {
    pub const CONNECT: &str = "connect";
    pub const CLOSE: &str = "close";
    pub const CREATE_STREAM: &str = "createStream";
    pub const DELETE_STREAM: &str = "deleteStream";
    pub const PLAY: &str = "play";
    pub const PUBLISH: &str = "publish";
}

pub mod s2c_command_names {
    pub const RESULT: &str = "_result";
    pub const ERROR: &str = "_error";
    pub const ON_STATUS: &str = "onStatus";
}

/// Format byte in front of the values of amf3 tagged command and data messages.
pub const AMF3_FORMAT_PREFIX: u8 = 0x00;

/// Invocation id of calls that expect no reply.
pub const ONE_WAY_INVOCATION_ID: u32 = 0;

pub mod fault_fields {
    pub const CODE: &str = "code";
    pub const FAULT_CODE: &str = "faultCode";
    pub const DESCRIPTION: &str = "description";
    pub const FAULT_STRING: &str = "faultString";
    pub const DETAILS: &str = "details";
    pub const FAULT_DETAIL: &str = "faultDetail";
    pub const LEVEL: &str = "level";
    pub const ROOT_CAUSE: &str = "rootCause";
    pub const EXTENDED_DATA: &str = "extendedData";
}
