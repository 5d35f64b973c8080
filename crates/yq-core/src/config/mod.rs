mod dirs;
mod settings;
mod validation;

pub use dirs::Directories;
pub use settings::{
    ApiSettings, IdentitySettings, RiverSettings, ScrollSettings, SearchSettings, Settings,
    TrackingSettings,
};
pub use validation::warn_unknown_fields;
