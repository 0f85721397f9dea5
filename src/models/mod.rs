// src/models/mod.rs

pub mod course;
pub mod progress;
