//! Configuration discovery for the smoorgh server

pub mod loader;

pub use loader::ServerConfigLoader;
