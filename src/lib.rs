pub mod batch;
pub mod blob;
pub mod budget;
pub mod config;
pub mod error;
pub mod footprint;
pub mod grid;
pub mod render;
pub mod rotation;
pub mod score;
pub mod search;
pub mod size;
pub mod solver;
pub mod types;
