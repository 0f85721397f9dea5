// src/lib.rs

pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod models;
pub mod persistence;
pub mod routes;
pub mod session;
pub mod state;
pub mod utils;

// Re-export specific items for convenience if needed
pub use engine::CourseProgressEngine;
pub use routes::create_router;
