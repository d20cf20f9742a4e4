//! CLI subcommand implementations for the fbevents binary.

pub mod doctor;
pub mod scrape_cmd;
pub mod spinner;
