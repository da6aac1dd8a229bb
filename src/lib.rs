pub mod record;
pub mod options;
pub mod env;
pub mod queue;
pub mod sink;
pub mod file_sink;
pub mod flush;
pub mod layer;

#[cfg(feature = "console")]
pub mod console_sink;

pub mod init;
pub mod noop_sink;

/// Target prefix of every event this crate emits about itself.
pub(crate) const CRATE_TARGET: &str = module_path!();
