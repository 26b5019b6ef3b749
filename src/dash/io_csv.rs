// Primitives for reading CSV exports.

use kpi_ranking::Cell;

use crate::dash::*;

pub fn read_csv_grid(path: &str) -> DashResult<Vec<Vec<Cell>>> {
    // The exports have title lines of varying width above the table.
    let rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .context(CsvOpenSnafu { path })?;

    let mut grid: Vec<Vec<Cell>> = Vec::new();
    for (idx, line_r) in rdr.into_records().enumerate() {
        let lineno = idx + 1;
        let line = line_r.context(CsvLineParseSnafu { lineno })?;
        let cells: Vec<Cell> = line.iter().map(Cell::from_text).collect();
        debug!("read_csv_grid: lineno: {:?} row: {:?}", lineno, &cells);
        grid.push(cells);
    }
    Ok(grid)
}
