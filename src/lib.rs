pub mod annotate;
pub mod common;
pub mod errors;
pub mod layers;
pub mod pipeline;
pub mod plan;
pub mod tree;
