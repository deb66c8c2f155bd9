//! Built-in tools

pub mod movie_facts;

pub use movie_facts::{MovieFactArgs, MovieFactTool};
