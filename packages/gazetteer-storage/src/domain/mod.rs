//! Record model and property accessors

pub mod names;
pub mod properties;
pub mod record;

pub use names::LanguageTag;
pub use properties::{Hierarchy, PropertyError};
pub use record::Record;
