pub mod ack;
pub mod auth;
pub mod classify;
pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod server;
pub mod telegram;
