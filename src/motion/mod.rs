pub mod body;
pub mod controller;
pub mod gait;
