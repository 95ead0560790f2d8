pub mod analysis;
pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod health;
pub mod interaction;
pub mod journal;
pub mod session;
pub mod validation;
pub mod wizard;
