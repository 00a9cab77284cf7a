pub mod config;
pub mod errors;
pub mod invocation;
pub mod session;

pub use crate::config::RtmpSessionConfig;
pub use crate::session::{PendingInvoke, RtmpSession, SessionEvent, SessionHandle};
