// Alertwire - alert notification dispatch
//
// Renders batches of evaluated alerts and delivers them to chat robots, corp
// app messaging and voice call APIs, reporting whether each failure is worth
// a retry.

// Re-export core functionality
pub use alertwire_notify::*;

// Re-export optional crates
#[cfg(feature = "config")]
pub use alertwire_config;

#[cfg(feature = "log")]
pub use alertwire_log;

// Prelude for common imports
pub mod prelude {
    pub use alertwire_notify::prelude::*;

    #[cfg(feature = "config")]
    pub use alertwire_config::{NotifierConfig, Validate};
}
