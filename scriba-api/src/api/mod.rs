//! HTTP API handlers

pub mod auth;
pub mod health;
pub mod projects;
pub mod subtitles;
pub mod transcribe;
pub mod tts;
