pub mod status;

pub use status::{StatusPublisher, StatusRecord};
