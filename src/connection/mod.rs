pub mod manager;
pub mod state;

pub use manager::{BackgroundTasks, ConnectOutcome, ConnectionManager, ConnectionTimings};
pub use state::{ConnectionState, StatusView, TrayIndicator, UpdateAvailability};
