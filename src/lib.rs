#[macro_use]
extern crate stump;

pub mod accel;
pub mod command;
pub mod config;
pub mod crop;
pub mod detail;
pub mod error;
pub mod filter;
pub mod frame;
pub mod guidance;
pub mod histogram;
pub mod mode;
pub mod overlay;
pub mod params;
pub mod pipeline;
pub mod probe;
pub mod reconstruct;
pub mod segment;
pub mod sharpness;
pub mod stats;
