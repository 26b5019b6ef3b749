// ********* Input data structures ***********

use std::error::Error;
use std::fmt::Display;

/// A single spreadsheet cell, as read by the readers and before any coercion.
#[derive(PartialEq, Debug, Clone)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
}

impl Cell {
    /// Builds a cell out of raw text. Whitespace-only text is treated as empty.
    pub fn from_text(s: &str) -> Cell {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(trimmed.to_string())
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Number(x) => x.is_nan(),
        }
    }

    /// Numeric coercion of the cell.
    ///
    /// Text is accepted when it parses as a number once trimmed. A comma is read as
    /// the decimal separator when the text has no dot (`"0,95"`).
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(x) if !x.is_nan() => Some(*x),
            Cell::Number(_) => None,
            Cell::Text(s) => {
                let t = s.trim();
                let normalized = if t.contains(',') && !t.contains('.') {
                    t.replace(',', ".")
                } else {
                    t.to_string()
                };
                normalized.parse::<f64>().ok().filter(|x| x.is_finite())
            }
            Cell::Empty => None,
        }
    }

    pub fn as_text(&self) -> Option<String> {
        if self.is_blank() {
            None
        } else {
            Some(self.to_string().trim().to_string())
        }
    }
}

impl Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Text(s) => write!(f, "{}", s),
            Cell::Number(x) if x.fract() == 0.0 && x.abs() < 1e15 => write!(f, "{}", *x as i64),
            Cell::Number(x) => write!(f, "{}", x),
        }
    }
}

/// Raised when a spreadsheet does not have the expected shape.
///
/// `lineno` is the 1-based row number in the source sheet.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct DataFormatError {
    pub lineno: usize,
    pub column: String,
    pub message: String,
}

impl Error for DataFormatError {}

impl Display for DataFormatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "DataFormatError at row {} column '{}': {}",
            self.lineno, self.column, self.message
        )
    }
}

// ********* Analyses **********

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// The two analyses supported by the dashboard. Each one has its own input layout.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum KpiKind {
    /// Share of managed customers using the customer-service app.
    AppAdoption,
    /// Share of customer requests handled after their deadline.
    LateTickets,
}

impl KpiKind {
    /// Number of rows above the header row in the exported sheet.
    pub fn header_rows(&self) -> usize {
        match self {
            KpiKind::AppAdoption => 2,
            KpiKind::LateTickets => 3,
        }
    }

    /// Number of positional columns of the exported table. Rows and header rows
    /// narrower than this do not come from this export.
    pub fn layout_width(&self) -> usize {
        match self {
            KpiKind::AppAdoption => 5,
            KpiKind::LateTickets => 9,
        }
    }

    /// The column holding the computed percentage.
    pub fn metric(&self) -> &'static str {
        match self {
            KpiKind::AppAdoption => ADOPTION_PCT,
            KpiKind::LateTickets => LATE_PCT,
        }
    }

    pub fn unit_column(&self) -> &'static str {
        match self {
            KpiKind::AppAdoption => ADOPTION_UNIT,
            KpiKind::LateTickets => TICKET_UNIT,
        }
    }

    pub fn higher_is_better(&self) -> bool {
        match self {
            KpiKind::AppAdoption => true,
            KpiKind::LateTickets => false,
        }
    }

    pub fn direction(&self) -> SortDirection {
        if self.higher_is_better() {
            SortDirection::Descending
        } else {
            SortDirection::Ascending
        }
    }

    /// Fixed name of the exported report. Exports overwrite any previous file.
    pub fn report_file_name(&self) -> &'static str {
        match self {
            KpiKind::AppAdoption => "Bao_cao_App_CSKH.docx",
            KpiKind::LateTickets => "Bao_cao_Yeu_cau_KH.docx",
        }
    }

    pub fn short_name(&self) -> &'static str {
        match self {
            KpiKind::AppAdoption => "app",
            KpiKind::LateTickets => "ticket",
        }
    }
}

// Canonical column names. The exported sheets are renamed to these regardless of
// their own header text.
pub const STT: &str = "STT";

pub const ADOPTION_UNIT: &str = "Điện lực";
pub const ADOPTION_MANAGED: &str = "Số lượng KH quản lý";
pub const ADOPTION_APP: &str = "Số lượng thực hiện App";
pub const ADOPTION_RATIO: &str = "Tỷ lệ thực hiện qua App";
pub const ADOPTION_PCT: &str = "Tỷ lệ thực hiện qua App (%)";

pub const TICKET_UNIT: &str = "Đơn vị";
pub const TICKET_PROCESSED: &str = "Số yêu cầu xử lý";
pub const TICKET_LATE: &str = "Phiếu trễ hạn";
pub const TICKET_LATE_RATIO: &str = "Tỷ lệ trễ hạn";
pub const TICKET_LATE_PCT: &str = "Tỷ lệ trễ hạn (%)";
pub const LATE_PCT: &str = TICKET_LATE_PCT;

// ******** Records *********

/// One row of the app adoption export.
#[derive(PartialEq, Debug, Clone)]
pub struct AdoptionRecord {
    pub stt: Cell,
    pub unit: String,
    pub managed_customers: f64,
    pub app_users: f64,
    pub adoption_ratio: f64,
    /// `adoption_ratio * 100`, rounded to 2 decimals.
    pub adoption_pct: f64,
}

/// One row of the request handling export.
#[derive(PartialEq, Debug, Clone)]
pub struct TicketRecord {
    pub stt: Cell,
    pub unit: String,
    pub processed: f64,
    pub late: f64,
    /// The rate column of the export, kept for display only.
    pub late_ratio: Cell,
    /// `late / processed * 100`, rounded to 2 decimals.
    pub late_pct: f64,
}

/// Common view over the record shapes, used by the whole pipeline.
pub trait KpiRecord: Clone + std::fmt::Debug {
    const KIND: KpiKind;

    /// Column names, in display order.
    fn columns() -> &'static [&'static str];

    /// The organization label of this row.
    fn unit(&self) -> &str;

    /// Numeric value of a column, if the column exists and holds a number.
    fn value(&self, field: &str) -> Option<f64>;

    /// The cells of the row, aligned with `columns()`.
    fn cells(&self) -> Vec<String>;

    /// Parses one positional row of the export.
    ///
    /// Returns `Ok(None)` for rows without a unit name (blank lines, trailing notes).
    fn parse_row(row: &[Cell], lineno: usize) -> Result<Option<Self>, DataFormatError>;
}

pub(crate) fn format_pct(x: f64) -> String {
    format!("{:.2}", x)
}

impl KpiRecord for AdoptionRecord {
    const KIND: KpiKind = KpiKind::AppAdoption;

    fn columns() -> &'static [&'static str] {
        &[
            STT,
            ADOPTION_UNIT,
            ADOPTION_MANAGED,
            ADOPTION_APP,
            ADOPTION_RATIO,
            ADOPTION_PCT,
        ]
    }

    fn unit(&self) -> &str {
        &self.unit
    }

    fn value(&self, field: &str) -> Option<f64> {
        match field {
            STT => self.stt.as_number(),
            ADOPTION_MANAGED => Some(self.managed_customers),
            ADOPTION_APP => Some(self.app_users),
            ADOPTION_RATIO => Some(self.adoption_ratio),
            ADOPTION_PCT => Some(self.adoption_pct),
            _ => None,
        }
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.stt.to_string(),
            self.unit.clone(),
            Cell::Number(self.managed_customers).to_string(),
            Cell::Number(self.app_users).to_string(),
            self.adoption_ratio.to_string(),
            format_pct(self.adoption_pct),
        ]
    }

    fn parse_row(row: &[Cell], lineno: usize) -> Result<Option<Self>, DataFormatError> {
        crate::builder::parse_adoption_row(row, lineno)
    }
}

impl KpiRecord for TicketRecord {
    const KIND: KpiKind = KpiKind::LateTickets;

    fn columns() -> &'static [&'static str] {
        &[
            STT,
            TICKET_UNIT,
            TICKET_PROCESSED,
            TICKET_LATE,
            TICKET_LATE_RATIO,
            TICKET_LATE_PCT,
        ]
    }

    fn unit(&self) -> &str {
        &self.unit
    }

    fn value(&self, field: &str) -> Option<f64> {
        match field {
            STT => self.stt.as_number(),
            TICKET_PROCESSED => Some(self.processed),
            TICKET_LATE => Some(self.late),
            TICKET_LATE_RATIO => self.late_ratio.as_number(),
            TICKET_LATE_PCT => Some(self.late_pct),
            _ => None,
        }
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.stt.to_string(),
            self.unit.clone(),
            Cell::Number(self.processed).to_string(),
            Cell::Number(self.late).to_string(),
            self.late_ratio.to_string(),
            format_pct(self.late_pct),
        ]
    }

    fn parse_row(row: &[Cell], lineno: usize) -> Result<Option<Self>, DataFormatError> {
        crate::builder::parse_ticket_row(row, lineno)
    }
}
