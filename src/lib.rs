pub mod boundary;
pub mod cli;
pub mod codec;
pub mod config;
pub mod discriminant;
pub mod error;
pub mod export;
pub mod features;
pub mod geometry;
pub mod gradient_descent;
pub mod pipeline;
pub mod render;
pub mod spatial;
pub mod support_vector_machine;
pub mod trainer;

pub use error::{Error, Result};
