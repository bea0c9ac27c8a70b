pub mod collector;
pub mod compose;
pub mod mount;
pub mod unit;

pub use collector::CollectorConfig;
pub use compose::{ComposeFile, ComposeNetwork, ComposeService};
pub use mount::{MountEntry, DATA_FILESYSTEM};
pub use unit::SystemdUnit;
