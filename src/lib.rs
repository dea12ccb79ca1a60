pub mod cli;
pub mod config;
pub mod cursor;
pub mod ingest;
pub mod notify;
pub mod source;
pub mod stats;
pub mod storage;
pub mod tui;
pub mod web;
