pub mod serve;
pub mod webhook;
