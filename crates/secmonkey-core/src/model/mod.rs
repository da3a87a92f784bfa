pub mod item;
pub mod location;
pub mod snapshot;
pub mod value;

pub use item::{Item, Revision};
pub use location::{ExceptionScope, Location};
pub use snapshot::ConfigSnapshot;
pub use value::{ConfigValue, Scalar};
