pub mod app;
pub mod call;
pub mod config;
pub mod dialogue;
pub mod handler;
pub mod llm;
pub mod session;
pub mod telephony;
pub mod twiml;
pub mod version;
