// src/lib.rs

//! Timetable Crawler Library
//!
//! Fetches group timetables from the university schedule site, keeps them in
//! a memory and disk cache, and periodically reports what changed.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;

#[cfg(feature = "server")]
pub mod server;
