use std::path::Path;

use kpi_ranking::Cell;

use crate::dash::{io_csv, io_excel, DashResult, UnknownInputTypeSnafu};

/// The spreadsheet formats that can be loaded.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum InputType {
    Xlsx,
    Csv,
}

impl InputType {
    pub fn parse(s: &str) -> DashResult<InputType> {
        match s.to_lowercase().as_str() {
            "xlsx" | "excel" => Ok(InputType::Xlsx),
            "csv" => Ok(InputType::Csv),
            _ => UnknownInputTypeSnafu { input_type: s }.fail(),
        }
    }

    /// Picks the format from the file extension.
    pub fn detect(path: &str) -> DashResult<InputType> {
        let ext = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");
        InputType::parse(ext)
    }
}

pub fn simplify_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path)
        .to_string()
}

/// Reads the whole sheet as rows of cells. Row `i` of the result is row `i + 1` of the
/// sheet, so that fixed header offsets can be applied by the normalizer.
pub fn read_grid(
    path: &str,
    input_type: InputType,
    excel_worksheet_name: Option<&str>,
) -> DashResult<Vec<Vec<Cell>>> {
    match input_type {
        InputType::Xlsx => io_excel::read_excel_grid(path, excel_worksheet_name),
        InputType::Csv => io_csv::read_csv_grid(path),
    }
}
