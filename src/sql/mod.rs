//! Safe SQL builder: identifiers from the resource registry only, values as parameters.

pub mod access;
mod builder;
pub mod catalog;
pub mod params;
pub use builder::*;
pub use params::*;
