//! Input/output helpers.
//!
//! - provider fragments -> canonical table (`normalize`)
//! - raw capture JSON read/write (`raw`)
//! - CSV exports (`export`)

pub mod export;
pub mod normalize;
pub mod raw;

pub use export::*;
pub use normalize::*;
pub use raw::*;
