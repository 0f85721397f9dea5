// src/handlers/mod.rs

pub mod courses;
pub mod learners;
pub mod progress;
