pub mod bytes;
pub mod io;
pub mod traits;
