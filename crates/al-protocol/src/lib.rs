pub mod intent;
pub mod lead;
pub mod offer;

pub use intent::*;
pub use lead::*;
pub use offer::*;
