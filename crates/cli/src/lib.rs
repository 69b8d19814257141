//! `dubflow-cli` -- drive a video through the dubbing service from the
//! command line.

pub mod config;
pub mod download;
pub mod pipeline;
