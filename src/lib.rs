pub mod config;
pub mod models;
pub mod assistant;
pub mod live;
pub mod api;
pub mod database;
pub mod tts;
pub mod coach;

pub use config::Config;
pub use models::*;
pub use assistant::{analyze, WritingAssistant};
pub use coach::WritingCoach;
