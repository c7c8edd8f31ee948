// src/fetch/mod.rs
pub mod cache;
pub mod urls;
pub mod zips;
