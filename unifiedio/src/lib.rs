//! Byte stream adapters shared by the protocol crates.
pub mod adler32;
pub mod zlib;
