//! Batch summarisation of customer review CSVs through a generative text model.

pub mod batch;
pub mod cli;
pub mod config;
pub mod logging;
pub mod records;
pub mod summarize;
