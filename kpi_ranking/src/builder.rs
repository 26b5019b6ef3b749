pub use crate::config::*;

use log::debug;

/// Rounds to 2 decimals, half away from zero.
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Turns the raw grid of an exported sheet into records.
///
/// The first `header_rows` rows of the sheet are skipped, then the header row itself is
/// dropped: the columns are identified by position, never by their header text.
/// Rows without a unit name are dropped.
/// The header row and the kept rows must be at least as wide as the layout of the export.
///
/// ```
/// use kpi_ranking::{normalize, AdoptionRecord, Cell};
///
/// let t = |s: &str| Cell::from_text(s);
/// let grid = vec![
///     vec![t("Báo cáo App CSKH")],
///     vec![t("Tháng 9")],
///     vec![t("STT"), t("Đơn vị"), t("KH"), t("App"), t("Tỷ lệ")],
///     vec![t("1"), t("Điện lực A"), t("200"), t("150"), t("0.75")],
///     vec![Cell::Empty, Cell::Empty, Cell::Empty, Cell::Empty, Cell::Empty],
/// ];
/// let rows: Vec<AdoptionRecord> = normalize(&grid)?;
/// assert_eq!(rows.len(), 1);
/// assert_eq!(rows[0].adoption_pct, 75.0);
/// # Ok::<(), kpi_ranking::DataFormatError>(())
/// ```
pub fn normalize<R: KpiRecord>(grid: &[Vec<Cell>]) -> Result<Vec<R>, DataFormatError> {
    let kind = R::KIND;
    let header_idx = kind.header_rows();
    match grid.get(header_idx) {
        Some(header) => check_width(header, kind, header_idx + 1)?,
        None => {
            return Err(DataFormatError {
                lineno: header_idx + 1,
                column: layout_column_name(kind, 0),
                message: format!("missing header row (sheet has {} rows)", grid.len()),
            })
        }
    }
    let first_data_row = header_idx + 1;
    let mut res: Vec<R> = Vec::new();
    for (idx, row) in grid.iter().enumerate().skip(first_data_row) {
        let lineno = idx + 1;
        if let Some(rec) = R::parse_row(row, lineno)? {
            debug!("normalize: lineno: {:?} record: {:?}", lineno, rec);
            res.push(rec);
        } else {
            debug!("normalize: lineno: {:?} dropping row without unit", lineno);
        }
    }
    debug!("normalize: {:?} records for {:?}", res.len(), R::KIND);
    Ok(res)
}

// Name of the column at a position of the export layout.
fn layout_column_name(kind: KpiKind, idx: usize) -> String {
    let canonical: &[&str] = match kind {
        KpiKind::AppAdoption => AdoptionRecord::columns(),
        KpiKind::LateTickets => TicketRecord::columns(),
    };
    // The last canonical column is computed, not read.
    match canonical.get(idx) {
        Some(name) if idx + 1 < canonical.len() => name.to_string(),
        _ => format!("column {}", idx + 1),
    }
}

fn check_width(row: &[Cell], kind: KpiKind, lineno: usize) -> Result<(), DataFormatError> {
    let width = kind.layout_width();
    if row.len() < width {
        return Err(DataFormatError {
            lineno,
            column: layout_column_name(kind, row.len()),
            message: format!("missing column (row has {} of {} columns)", row.len(), width),
        });
    }
    Ok(())
}

fn get_cell<'a>(
    row: &'a [Cell],
    idx: usize,
    column: &str,
    lineno: usize,
) -> Result<&'a Cell, DataFormatError> {
    row.get(idx).ok_or_else(|| DataFormatError {
        lineno,
        column: column.to_string(),
        message: format!("missing column (row has {} columns)", row.len()),
    })
}

fn get_number(
    row: &[Cell],
    idx: usize,
    column: &str,
    lineno: usize,
) -> Result<f64, DataFormatError> {
    let cell = get_cell(row, idx, column, lineno)?;
    cell.as_number().ok_or_else(|| DataFormatError {
        lineno,
        column: column.to_string(),
        message: format!("expected a number, found {:?}", cell),
    })
}

// The unit name is checked first: rows without one are dropped before any other
// column is looked at, even when the row is shorter than the layout.
fn get_unit(row: &[Cell]) -> Option<String> {
    row.get(1).and_then(|c| c.as_text())
}

pub(crate) fn parse_adoption_row(
    row: &[Cell],
    lineno: usize,
) -> Result<Option<AdoptionRecord>, DataFormatError> {
    let unit = match get_unit(row) {
        Some(u) => u,
        None => return Ok(None),
    };
    check_width(row, KpiKind::AppAdoption, lineno)?;
    let stt = get_cell(row, 0, STT, lineno)?.clone();
    let managed_customers = get_number(row, 2, ADOPTION_MANAGED, lineno)?;
    let app_users = get_number(row, 3, ADOPTION_APP, lineno)?;
    let adoption_ratio = get_number(row, 4, ADOPTION_RATIO, lineno)?;
    Ok(Some(AdoptionRecord {
        stt,
        unit,
        managed_customers,
        app_users,
        adoption_ratio,
        adoption_pct: round2(adoption_ratio * 100.0),
    }))
}

pub(crate) fn parse_ticket_row(
    row: &[Cell],
    lineno: usize,
) -> Result<Option<TicketRecord>, DataFormatError> {
    let unit = match get_unit(row) {
        Some(u) => u,
        None => return Ok(None),
    };
    check_width(row, KpiKind::LateTickets, lineno)?;
    let stt = get_cell(row, 0, STT, lineno)?.clone();
    let processed = get_number(row, 2, TICKET_PROCESSED, lineno)?;
    let late = get_number(row, 3, TICKET_LATE, lineno)?;
    // Read for display only. The percentage is always recomputed from the counts.
    let late_ratio = get_cell(row, 4, TICKET_LATE_RATIO, lineno)?.clone();

    let late_pct = if processed == 0.0 {
        if late > 0.0 {
            return Err(DataFormatError {
                lineno,
                column: TICKET_LATE.to_string(),
                message: format!("{} late tickets but no processed tickets", late),
            });
        }
        0.0
    } else {
        round2(late / processed * 100.0)
    };

    Ok(Some(TicketRecord {
        stt,
        unit,
        processed,
        late,
        late_ratio,
        late_pct,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> Cell {
        Cell::from_text(s)
    }

    // Title rows followed by a header row as wide as the layout.
    fn header(kind: KpiKind) -> Vec<Vec<Cell>> {
        let mut grid: Vec<Vec<Cell>> = (0..kind.header_rows())
            .map(|i| vec![t(&format!("title {}", i))])
            .collect();
        grid.push(
            (0..kind.layout_width())
                .map(|i| t(&format!("h{}", i)))
                .collect(),
        );
        grid
    }

    fn ticket_row(stt: &str, unit: &str, processed: &str, late: &str, ratio: &str) -> Vec<Cell> {
        let mut row = vec![t(stt), t(unit), t(processed), t(late), t(ratio)];
        row.resize(KpiKind::LateTickets.layout_width(), Cell::Empty);
        row
    }

    fn adoption_grid() -> Vec<Vec<Cell>> {
        let mut grid = header(KpiKind::AppAdoption);
        grid.push(vec![t("1"), t("Điện lực A"), t("1000"), t("900"), t("0.9")]);
        grid.push(vec![t("2"), t("Điện lực B"), t("2000"), t("1900"), t("0.95")]);
        grid
    }

    #[test]
    fn adoption_rows_are_renamed_and_computed() {
        let mut grid = header(KpiKind::AppAdoption);
        grid.push(vec![t("1"), t("Điện lực A"), t("1000"), t("905"), t("0.905")]);
        grid.push(vec![
            Cell::Number(2.0),
            t("Điện lực B"),
            Cell::Number(20.0),
            Cell::Number(3.0),
            Cell::Number(0.15),
        ]);
        let rows: Vec<AdoptionRecord> = normalize(&grid).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].unit, "Điện lực A");
        assert_eq!(rows[0].managed_customers, 1000.0);
        assert_eq!(rows[0].adoption_pct, 90.5);
        assert_eq!(rows[1].adoption_pct, 15.0);
        assert_eq!(
            rows[1].cells(),
            vec!["2", "Điện lực B", "20", "3", "0.15", "15.00"]
        );
    }

    #[test]
    fn rows_without_unit_are_dropped() {
        let mut grid = header(KpiKind::AppAdoption);
        grid.push(vec![t("1"), t("Điện lực A"), t("10"), t("5"), t("0.5")]);
        grid.push(vec![t("Tổng"), Cell::Empty, t("10"), t("5"), t("0.5")]);
        grid.push(vec![t(""), t("   ")]);
        grid.push(vec![]);
        let rows: Vec<AdoptionRecord> = normalize(&grid).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn late_percentage_is_recomputed() {
        let mut grid = header(KpiKind::LateTickets);
        // The rate column claims 0.99: it must be ignored.
        grid.push(vec![
            t("1"),
            t("Đội A"),
            t("200"),
            t("10"),
            t("0.99"),
            t("190"),
            t("0.95"),
            t("0.9"),
            t("Đạt"),
        ]);
        let rows: Vec<TicketRecord> = normalize(&grid).unwrap();
        assert_eq!(rows[0].late_pct, 5.0);
        assert_eq!(rows[0].cells()[5], "5.00");
        assert_eq!(rows[0].cells()[4], "0.99");
    }

    #[test]
    fn late_percentage_rounds_to_two_decimals() {
        let mut grid = header(KpiKind::LateTickets);
        grid.push(ticket_row("1", "Đội A", "3", "1", ""));
        let rows: Vec<TicketRecord> = normalize(&grid).unwrap();
        assert_eq!(rows[0].late_pct, 33.33);
    }

    #[test]
    fn zero_processed_tickets() {
        let mut grid = header(KpiKind::LateTickets);
        grid.push(ticket_row("1", "Đội A", "0", "0", ""));
        let rows: Vec<TicketRecord> = normalize(&grid).unwrap();
        assert_eq!(rows[0].late_pct, 0.0);

        let mut grid = header(KpiKind::LateTickets);
        grid.push(ticket_row("1", "Đội A", "0", "2", ""));
        let err = normalize::<TicketRecord>(&grid).unwrap_err();
        assert_eq!(err.column, TICKET_LATE);
    }

    #[test]
    fn non_numeric_cells_fail() {
        let mut grid = header(KpiKind::AppAdoption);
        grid.push(vec![t("1"), t("Điện lực A"), t("10"), t("5"), t("n/a")]);
        let err = normalize::<AdoptionRecord>(&grid).unwrap_err();
        assert_eq!(err.lineno, 4);
        assert_eq!(err.column, ADOPTION_RATIO);
    }

    #[test]
    fn non_numeric_counts_fail() {
        let mut grid = header(KpiKind::AppAdoption);
        grid.push(vec![t("1"), t("Điện lực A"), t("n/a"), t("abc"), t("0.9")]);
        let err = normalize::<AdoptionRecord>(&grid).unwrap_err();
        assert_eq!(err.lineno, 4);
        assert_eq!(err.column, ADOPTION_MANAGED);

        let mut grid = header(KpiKind::AppAdoption);
        grid.push(vec![t("1"), t("Điện lực A"), t("1000"), t("abc"), t("0.9")]);
        let err = normalize::<AdoptionRecord>(&grid).unwrap_err();
        assert_eq!(err.column, ADOPTION_APP);
    }

    #[test]
    fn short_rows_fail() {
        let mut grid = header(KpiKind::LateTickets);
        grid.push(vec![t("1"), t("Đội A"), t("10")]);
        let err = normalize::<TicketRecord>(&grid).unwrap_err();
        assert_eq!(err.lineno, 5);
        assert_eq!(err.column, TICKET_LATE);
        assert!(err.to_string().contains("missing column"));

        // All 9 columns of the request export are required, even the unused ones.
        let mut grid = header(KpiKind::LateTickets);
        grid.push(vec![t("1"), t("Đội A"), t("10"), t("1"), t("0.1")]);
        let err = normalize::<TicketRecord>(&grid).unwrap_err();
        assert_eq!(err.column, "column 6");
    }

    #[test]
    fn adoption_export_is_not_a_ticket_export() {
        let err = normalize::<TicketRecord>(&adoption_grid()).unwrap_err();
        // The fourth row is the header row of the request layout.
        assert_eq!(err.lineno, 4);
        assert_eq!(err.column, "column 6");
        assert!(err.message.contains("5 of 9"));
    }

    #[test]
    fn narrow_header_row_fails() {
        let mut grid = adoption_grid();
        grid[2].truncate(3);
        let err = normalize::<AdoptionRecord>(&grid).unwrap_err();
        assert_eq!(err.lineno, 3);
        assert_eq!(err.column, ADOPTION_APP);
    }

    #[test]
    fn missing_header_row_fails() {
        let grid = vec![vec![t("BÁO CÁO")], vec![t("Tháng 9")]];
        let err = normalize::<AdoptionRecord>(&grid).unwrap_err();
        assert_eq!(err.lineno, 3);
        assert!(err.message.contains("missing header row"));
    }

    #[test]
    fn comma_decimal_separator() {
        assert_eq!(t("0,95").as_number(), Some(0.95));
        assert_eq!(t("1,000.5").as_number(), None);
        assert_eq!(t(" 12 ").as_number(), Some(12.0));
        assert_eq!(Cell::Empty.as_number(), None);
    }
}
