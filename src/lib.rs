pub mod app;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod feed;
pub mod models;
pub mod select;
pub mod services;

#[cfg(test)]
mod testing;

pub use app::{App, CompileReport, CompileRequest, Delivery, Mode, Services, UnitOutcome};
pub use error::{AppError, Result};
