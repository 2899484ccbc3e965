#![deny(rust_2018_idioms)]
#![deny(clippy::all)]
#![allow(clippy::module_inception)]

pub mod config;
pub mod error;
pub mod file;
pub mod options;
pub mod pipeline;
pub mod stage;
pub mod transform;
