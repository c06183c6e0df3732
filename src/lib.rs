pub mod constants;
pub mod engine;
pub mod error;
pub mod input;
pub mod protocol;
pub mod rng;
pub mod runtime;
pub mod types;
pub mod world;
