pub mod cache;
pub mod commands;
pub mod handle;
pub mod interpreter;
pub mod monitor;
pub mod snapshot;
pub mod state;

pub use commands::MonitorError;
pub use handle::MonitorHandle;
pub use monitor::SessionMonitor;
