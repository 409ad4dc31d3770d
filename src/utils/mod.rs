pub mod config_parser;
pub mod geometry;
