use colored::Colorize;
use std::io::{self, Write};

use crate::refine::types::{ColumnType, RefineSummary};

/// Print the refined schema as a tree:
///
/// root
///  |-- url: string (nullable = true)
///  |-- id: long (nullable = true)
///  ...
pub fn print_schema(schema: &[(&str, ColumnType)]) -> io::Result<()> {
    write_schema(&mut io::stdout().lock(), schema)
}

fn write_schema(out: &mut impl Write, schema: &[(&str, ColumnType)]) -> io::Result<()> {
    writeln!(out, "root")?;
    for (name, column_type) in schema {
        writeln!(out, " |-- {}: {} (nullable = true)", name, column_type)?;
    }
    writeln!(out)
}

/// Print the row-count confirmation for a finished refine run.
pub fn print_summary(summary: &RefineSummary) -> io::Result<()> {
    write_summary(&mut io::stdout().lock(), summary)
}

fn write_summary(out: &mut impl Write, summary: &RefineSummary) -> io::Result<()> {
    writeln!(
        out,
        "{} rows outputted to file {}",
        summary.rows_written.to_string().green().bold(),
        summary.output.display()
    )
}
