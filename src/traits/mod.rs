//! Core traits for the injection environment.

mod construct;
mod dispose;

pub use construct::Construct;
pub use dispose::Dispose;
