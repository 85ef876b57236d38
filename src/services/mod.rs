pub mod export;
pub mod factory;
pub mod image;
pub mod llm;
pub mod script;
pub mod setup;
pub mod workflow;
