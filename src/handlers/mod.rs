pub mod explain;
pub mod health;
pub mod select;

pub use explain::explain_handler;
pub use health::{health_handler, ready_handler, stats_handler};
pub use select::select_tools_handler;
