#![allow(clippy::new_without_default)]

#[macro_use]
extern crate log;
#[macro_use]
extern crate anyhow;

pub mod api;
pub mod geodesy;
pub mod location_source;
mod logs;
pub mod scheduler;
pub mod tracker;
