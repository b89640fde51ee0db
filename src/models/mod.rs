mod definition;
mod snapshot;

pub use definition::*;
pub use snapshot::*;
