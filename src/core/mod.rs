pub mod config;
pub mod credentials;
pub mod error;
pub mod io;
pub mod story;
