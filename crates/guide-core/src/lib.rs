pub mod api;
pub mod config;
pub mod error;
pub mod llms_txt;
pub mod loader;
pub mod model;
pub mod parser;
pub mod search;
pub mod update;
