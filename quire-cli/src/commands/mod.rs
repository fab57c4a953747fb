//! CLI command implementations

mod batch;
mod info;
mod validate;

pub use batch::batch;
pub use info::info;
pub use validate::validate;

use quire_core::{Streamer, StreamerConfig, StreamerSettings};

/// Global flags shaping the streamer shared by all commands
pub struct StreamerArgs {
    pub chars_per_page: Option<u64>,
    pub no_default_parsers: bool,
}

impl StreamerArgs {
    pub fn settings(&self) -> StreamerSettings {
        let mut settings = StreamerSettings {
            ignore_default_parsers: self.no_default_parsers,
            ..Default::default()
        };
        if let Some(chars_per_page) = self.chars_per_page {
            settings.chars_per_page = chars_per_page;
        }
        settings
    }

    /// Streamer recognizing protected publications and opening them restricted
    pub fn build(&self) -> Streamer {
        let config = StreamerConfig::from_settings(&self.settings()).with_fallback_protections();
        Streamer::new(config)
    }
}
