pub mod steps;
pub mod types;
