pub mod api;
pub mod app;
pub mod config;
pub mod genai;
pub mod pages;
pub mod research;
pub mod runlog;
pub mod runs;
pub mod sessions;
