//! Configuration types for smoorgh core
//!
//! Only exports pure data types. All loading logic is in the server layer.

pub mod types;

pub use types::{
    FactApiConfig, ModelParams, Protocol, ResolvedConfig, ResolvedEmbeddingConfig,
    ResolvedLlmConfig, ResolvedSearchConfig, DEFAULT_FACT_API_URL,
};
