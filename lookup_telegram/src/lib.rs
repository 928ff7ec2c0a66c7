#![deny(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

//! Telegram front end for the lookup service.

mod bot;
mod command;
mod error;
mod handler;
mod keyboard;
pub mod render;

pub use bot::TelegramBot;
pub use command::{Callback, Command};
pub use error::{Error, Result};
