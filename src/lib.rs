pub mod errors;
pub mod groove;
pub mod motion;
pub mod simulation;
pub mod spacetime;
pub mod utils;

pub use errors::Error;
