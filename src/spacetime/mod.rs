pub mod chain;
pub mod constraint;
