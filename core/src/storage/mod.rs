pub mod atomic;
pub mod jpeg;
pub mod layout;

pub use atomic::atomic_write;
pub use jpeg::encode_jpeg;
pub use layout::{MediaConfig, MediaLayout};
