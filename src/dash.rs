use log::{debug, info, warn};

use kpi_ranking::*;
use snafu::{prelude::*, Snafu};

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;
use serde_json::Value as JSValue;
use text_diff::print_diff;

pub mod chart;
pub mod config_reader;
pub mod io_common;
pub mod io_csv;
pub mod io_excel;
pub mod report;

use crate::dash::chart::ChartSet;
use crate::dash::config_reader::*;
use crate::dash::io_common::{read_grid, simplify_file_name, InputType};

#[derive(Debug, Snafu)]
pub enum DashError {
    #[snafu(display("Error opening file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("Cannot find worksheet {name} in {path}"))]
    MissingWorksheet { path: String, name: String },
    #[snafu(display("Error opening file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("Error reading line {lineno}"))]
    CsvLineParse { source: csv::Error, lineno: usize },
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Unexpected content in {path}: {source}"))]
    DataFormat {
        source: DataFormatError,
        path: String,
    },
    #[snafu(display("Unknown input type {input_type:?} (expected xlsx or csv)"))]
    UnknownInputType { input_type: String },
    #[snafu(display("Unknown analysis {kind:?} (expected app or ticket)"))]
    UnknownKind { kind: String },
    #[snafu(display("No input file given (use --input or filePath in the config)"))]
    MissingInput {},
    #[snafu(display("Cannot draw chart {title:?}: {message}"))]
    ChartSvg { title: String, message: String },
    #[snafu(display("Cannot allocate a {width}x{height} chart"))]
    ChartRaster { width: u32, height: u32 },
    #[snafu(display("Error encoding chart as PNG"))]
    PngEncoding { source: png::EncodingError },
    #[snafu(display("Error writing {path}"))]
    WritingOutput {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error writing report {path}"))]
    ZipReport {
        source: zip::result::ZipError,
        path: String,
    },
    #[snafu(display("Difference detected between calculated summary and reference summary {path}"))]
    ReferenceMismatch { path: String },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type DashResult<T> = Result<T, DashError>;

/// Everything a run needs, once the command line and the config file are merged.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct DashSettings {
    pub kind: KpiKind,
    pub input: String,
    pub input_type: InputType,
    pub excel_worksheet_name: Option<String>,
    pub unit: UnitFilter,
    pub list_units: bool,
    pub report: bool,
    pub charts: bool,
    pub output_directory: PathBuf,
    pub out: Option<String>,
    pub reference: Option<String>,
}

/// The state of one dashboard session: the ranked rows of the loaded file and the
/// current selection. A new file means a new session.
pub struct Session<R: KpiRecord> {
    ranked: Vec<R>,
    filter: UnitFilter,
    classifier: Box<dyn Classifier>,
}

impl<R: KpiRecord> Session<R> {
    pub fn load(rows: Vec<R>, classifier: Box<dyn Classifier>) -> Session<R> {
        let ranked = rank_rows(rows, classifier.as_ref());
        Session {
            ranked,
            filter: UnitFilter::All,
            classifier,
        }
    }

    pub fn ranked(&self) -> &[R] {
        &self.ranked
    }

    /// The pick-list offered for filtering.
    pub fn choices(&self) -> Vec<String> {
        unit_choices(&self.ranked)
    }

    pub fn select(&mut self, filter: UnitFilter) {
        debug!("Session::select: {:?}", filter);
        self.filter = filter;
    }

    pub fn analysis(&self) -> Analysis<R> {
        run_analysis(&self.ranked, self.classifier.as_ref(), &self.filter)
    }
}

pub fn load_session<R: KpiRecord>(settings: &DashSettings) -> DashResult<Session<R>> {
    info!(
        "Attempting to read {:?} file {:?}",
        settings.input_type, settings.input
    );
    let grid = read_grid(
        &settings.input,
        settings.input_type,
        settings.excel_worksheet_name.as_deref(),
    )?;
    debug!("load_session: {:?} raw rows", grid.len());
    let rows: Vec<R> = normalize(&grid).context(DataFormatSnafu {
        path: settings.input.clone(),
    })?;
    info!("Loaded {:?} rows from {:?}", rows.len(), settings.input);
    Ok(Session::load(
        rows,
        Box::new(SubstringClassifier::default()),
    ))
}

fn rows_to_json<R: KpiRecord>(rows: &[R]) -> Vec<JSValue> {
    rows.iter().map(|r| json!(r.cells())).collect()
}

fn build_summary_js<R: KpiRecord>(settings: &DashSettings, analysis: &Analysis<R>) -> JSValue {
    json!({
        "config": {
            "kind": R::KIND.short_name(),
            "input": simplify_file_name(&settings.input),
            "metric": R::KIND.metric(),
            "unit": settings.unit.label(),
        },
        "results": {
            "columns": R::columns(),
            "table": rows_to_json(&analysis.full),
            "top3": rows_to_json(&analysis.top),
            "bottom3": rows_to_json(&analysis.bottom),
        }
    })
}

/// Lays out the rows as a plain text table, one line per record.
pub fn format_table(columns: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = columns.iter().map(|c| c.chars().count()).collect();
    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(idx) {
                *w = (*w).max(cell.chars().count());
            }
        }
    }
    let fmt_line = |cells: Vec<&str>| -> String {
        cells
            .iter()
            .zip(widths.iter())
            .map(|(c, w)| format!("{}{}", c, " ".repeat(w - c.chars().count())))
            .collect::<Vec<String>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };
    let mut lines: Vec<String> = vec![fmt_line(columns.to_vec())];
    lines.push(
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<String>>()
            .join("-+-"),
    );
    for row in rows {
        lines.push(fmt_line(row.iter().map(|s| s.as_str()).collect()));
    }
    lines.join("\n")
}

fn check_reference(reference_path: &str, pretty_js_stats: &str) -> DashResult<()> {
    let summary_ref = read_summary(reference_path)?;
    debug!("summary: {:?}", summary_ref);
    let pretty_js_summary_ref =
        serde_json::to_string_pretty(&summary_ref).context(ParsingJsonSnafu {})?;
    if pretty_js_summary_ref != pretty_js_stats {
        warn!("Found differences with the reference string");
        print_diff(pretty_js_summary_ref.as_str(), pretty_js_stats, "\n");
        return ReferenceMismatchSnafu {
            path: reference_path,
        }
        .fail();
    }
    info!("Summary matches reference {:?}", reference_path);
    Ok(())
}

fn ensure_output_directory(dir: &Path) -> DashResult<()> {
    fs::create_dir_all(dir).context(WritingOutputSnafu {
        path: dir.display().to_string(),
    })
}

fn run_kind<R: KpiRecord>(settings: &DashSettings) -> DashResult<()> {
    let mut session: Session<R> = load_session(settings)?;

    if settings.list_units {
        for choice in session.choices() {
            println!("{}", choice);
        }
        return Ok(());
    }

    session.select(settings.unit.clone());
    let analysis = session.analysis();
    if analysis.full.is_empty() {
        warn!("No rows left for unit {:?}", settings.unit.label());
    }

    let charts = ChartSet::render(&analysis)?;

    let stem = match Path::new(R::KIND.report_file_name())
        .file_stem()
        .and_then(|s| s.to_str())
    {
        Some(s) => s.to_string(),
        None => whatever!("No file stem in {:?}", R::KIND.report_file_name()),
    };
    if settings.charts {
        ensure_output_directory(&settings.output_directory)?;
        for p in charts.write_all(&settings.output_directory, &stem)? {
            println!("chart: {}", p.display());
        }
    }

    if settings.report {
        ensure_output_directory(&settings.output_directory)?;
        let report_path = settings.output_directory.join(R::KIND.report_file_name());
        let written = report::write_report(&report_path, &analysis, &charts)?;
        println!("report: {}", written.display());
    }

    let result_js = build_summary_js(settings, &analysis);
    let pretty_js_stats = serde_json::to_string_pretty(&result_js).context(ParsingJsonSnafu {})?;
    match settings.out.as_deref() {
        None | Some("") => {
            let rows: Vec<Vec<String>> = analysis.full.iter().map(|r| r.cells()).collect();
            println!("{}", format_table(R::columns(), &rows));
        }
        Some("stdout") => println!("summary:{}", pretty_js_stats),
        Some(p) => {
            fs::write(p, &pretty_js_stats).context(WritingOutputSnafu { path: p })?;
            info!("Summary written to {:?}", p);
        }
    }

    // The reference summary, if provided for comparison
    if let Some(reference_path) = settings.reference.as_deref() {
        check_reference(reference_path, &pretty_js_stats)?;
    }

    Ok(())
}

pub fn run_dashboard(settings: &DashSettings) -> DashResult<()> {
    info!("settings: {:?}", settings);
    match settings.kind {
        KpiKind::AppAdoption => run_kind::<AdoptionRecord>(settings),
        KpiKind::LateTickets => run_kind::<TicketRecord>(settings),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data_path(name: &str) -> String {
        format!("{}/tests/data/{}", env!("CARGO_MANIFEST_DIR"), name)
    }

    fn settings(kind: KpiKind, input: &str, out_dir: &Path) -> DashSettings {
        DashSettings {
            kind,
            input: data_path(input),
            input_type: InputType::Csv,
            excel_worksheet_name: None,
            unit: UnitFilter::All,
            list_units: false,
            report: false,
            charts: false,
            output_directory: out_dir.to_path_buf(),
            out: None,
            reference: None,
        }
    }

    fn units<R: KpiRecord>(rows: &[R]) -> Vec<String> {
        rows.iter().map(|r| r.unit().to_string()).collect()
    }

    #[test]
    fn app_adoption_matches_reference() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = settings(KpiKind::AppAdoption, "app_cskh.csv", dir.path());
        s.out = Some(dir.path().join("summary.json").display().to_string());
        s.reference = Some(data_path("app_cskh_expected_summary.json"));
        run_dashboard(&s).unwrap();
        assert!(dir.path().join("summary.json").exists());
    }

    #[test]
    fn reference_mismatch_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = settings(KpiKind::AppAdoption, "app_cskh.csv", dir.path());
        s.out = Some(dir.path().join("summary.json").display().to_string());
        s.unit = UnitFilter::Unit("Điện lực A".to_string());
        s.reference = Some(data_path("app_cskh_expected_summary.json"));
        let err = run_dashboard(&s).unwrap_err();
        assert!(matches!(err, DashError::ReferenceMismatch { .. }));
    }

    #[test]
    fn ticket_session() {
        let dir = tempfile::tempdir().unwrap();
        let s = settings(KpiKind::LateTickets, "yeu_cau_kh.csv", dir.path());
        let mut session: Session<TicketRecord> = load_session(&s).unwrap();
        assert_eq!(
            units(session.ranked()),
            vec![
                "Đội QLĐ Bắc",
                "Đội QLĐ Nam",
                "Đội QLĐ Đông",
                "Đội QLĐ Tây",
                "Công ty Điện lực Tỉnh"
            ]
        );
        let analysis = session.analysis();
        assert_eq!(
            units(&analysis.top),
            vec!["Đội QLĐ Tây", "Đội QLĐ Đông", "Đội QLĐ Nam"]
        );
        assert_eq!(
            units(&analysis.bottom),
            vec!["Đội QLĐ Bắc", "Đội QLĐ Nam", "Đội QLĐ Đông"]
        );
        // 10 late out of 200 processed, whatever the rate column says.
        assert_eq!(analysis.full[2].late_pct, 5.0);

        session.select(UnitFilter::from_choice(Some("Đội QLĐ Nam")));
        let analysis = session.analysis();
        assert_eq!(units(&analysis.full), vec!["Đội QLĐ Nam"]);
        assert_eq!(units(&analysis.top), vec!["Đội QLĐ Nam"]);
        assert_eq!(units(&analysis.bottom), vec!["Đội QLĐ Nam"]);
    }

    #[test]
    fn full_run_writes_report_and_charts() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = settings(KpiKind::LateTickets, "yeu_cau_kh.csv", dir.path());
        s.report = true;
        s.charts = true;
        run_dashboard(&s).unwrap();
        assert!(dir.path().join("Bao_cao_Yeu_cau_KH.docx").exists());
        assert!(dir.path().join("Bao_cao_Yeu_cau_KH_all.png").exists());
        assert!(dir.path().join("Bao_cao_Yeu_cau_KH_top.png").exists());
        assert!(dir.path().join("Bao_cao_Yeu_cau_KH_bottom.png").exists());
    }

    #[test]
    fn empty_selection_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = settings(KpiKind::AppAdoption, "app_cskh.csv", dir.path());
        s.unit = UnitFilter::Unit("Không tồn tại".to_string());
        s.report = true;
        run_dashboard(&s).unwrap();
        assert!(dir.path().join("Bao_cao_App_CSKH.docx").exists());
    }

    #[test]
    fn malformed_export_is_a_data_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let s = settings(KpiKind::AppAdoption, "malformed.csv", dir.path());
        let err = run_dashboard(&s).unwrap_err();
        assert!(matches!(err, DashError::DataFormat { .. }));
        assert!(err.to_string().contains("row 5"));
    }

    #[test]
    fn wrong_kind_is_a_data_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let s = settings(KpiKind::LateTickets, "app_cskh.csv", dir.path());
        let err = run_dashboard(&s).unwrap_err();
        assert!(matches!(err, DashError::DataFormat { .. }));
        assert!(err.to_string().contains("5 of 9 columns"));
    }

    #[test]
    fn text_table_is_aligned() {
        let rows = vec![
            vec!["1".to_string(), "Điện lực A".to_string()],
            vec!["10".to_string(), "B".to_string()],
        ];
        let s = format_table(&["STT", "Đơn vị"], &rows);
        let lines: Vec<&str> = s.lines().collect();
        assert_eq!(lines[0], "STT | Đơn vị");
        assert_eq!(lines[1], "----+-----------");
        assert_eq!(lines[2], "1   | Điện lực A");
        assert_eq!(lines[3], "10  | B");
    }
}
