//! Concrete resources managed by the lifecycle core.

mod brand;
mod placeholder;

pub use brand::{Brand, BrandFields, BrandPatch};
pub use placeholder::{Placeholder, PlaceholderFields, PlaceholderPatch};
