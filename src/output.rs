//! Output formatting

use clap::ValueEnum;
use serde::Serialize;
use tabled::{Table, Tabled};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Yaml,
}

impl OutputFormat {
    pub fn print<T: Serialize + Tabled>(&self, rows: &[T]) {
        match self {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(rows).unwrap_or_default());
            }
            OutputFormat::Yaml => {
                println!("{}", serde_yaml::to_string(rows).unwrap_or_default());
            }
            OutputFormat::Table => {
                println!("{}", Table::new(rows));
            }
        }
    }
}
