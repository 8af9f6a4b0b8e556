//! Interview — a conversational questionnaire engine.

pub mod channels;
pub mod config;
pub mod error;
pub mod interview;
