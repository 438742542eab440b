pub mod resources;
pub mod settings;

pub use resources::*;
pub use settings::*;
