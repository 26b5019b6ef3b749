use calamine::{open_workbook, DataType, Reader, Xlsx};

use kpi_ranking::Cell;

use crate::dash::*;

/// Reads a worksheet as a grid aligned on the sheet coordinates.
///
/// calamine starts its ranges at the first used cell, so leading empty rows and
/// columns are put back: the header offsets count from the top of the sheet.
pub fn read_excel_grid(path: &str, worksheet_name: Option<&str>) -> DashResult<Vec<Vec<Cell>>> {
    let wrange = get_range(path, worksheet_name)?;
    let (first_row, first_col) = wrange.start().unwrap_or((0, 0));
    debug!(
        "read_excel_grid: path: {:?} start: {:?} size: {:?}",
        path,
        (first_row, first_col),
        wrange.get_size()
    );

    let mut grid: Vec<Vec<Cell>> = (0..first_row).map(|_| Vec::new()).collect();
    for row in wrange.rows() {
        let mut cells: Vec<Cell> = vec![Cell::Empty; first_col as usize];
        cells.extend(row.iter().map(read_cell));
        grid.push(cells);
    }
    Ok(grid)
}

fn read_cell(cell: &DataType) -> Cell {
    match cell {
        DataType::String(s) => Cell::from_text(s),
        DataType::Float(f) => Cell::Number(*f),
        DataType::Int(i) => Cell::Number(*i as f64),
        DataType::DateTime(f) => Cell::Number(*f),
        DataType::Bool(b) => Cell::Text(b.to_string()),
        DataType::Empty => Cell::Empty,
        other => Cell::Text(format!("{:?}", other)),
    }
}

fn get_range(path: &str, worksheet_name: Option<&str>) -> DashResult<calamine::Range<DataType>> {
    debug!(
        "get_range: path: {:?} worksheet: {:?}",
        path, worksheet_name
    );
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;

    // A worksheet name was provided, use it.
    if let Some(name) = worksheet_name {
        workbook
            .worksheet_range(name)
            .context(MissingWorksheetSnafu { path, name })?
            .context(OpeningExcelSnafu { path })
    } else {
        workbook
            .worksheet_range_at(0)
            .context(MissingWorksheetSnafu {
                path,
                name: "#1",
            })?
            .context(OpeningExcelSnafu { path })
    }
}
