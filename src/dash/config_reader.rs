use crate::args::Args;
use crate::dash::io_common::InputType;
use crate::dash::*;

use serde::{Deserialize, Serialize};

/// The JSON settings file. Every field is optional; the command line wins over it.
#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct DashConfig {
    pub kind: Option<String>,
    #[serde(rename = "filePath")]
    pub file_path: Option<String>,
    #[serde(rename = "inputType")]
    pub input_type: Option<String>,
    #[serde(rename = "excelWorksheetName")]
    pub excel_worksheet_name: Option<String>,
    pub unit: Option<String>,
    #[serde(rename = "outputDirectory")]
    pub output_directory: Option<String>,
    pub report: Option<bool>,
    pub charts: Option<bool>,
}

pub fn read_config(path: &str) -> DashResult<DashConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})
}

pub fn read_summary(path: &str) -> DashResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(js)
}

pub fn parse_kind(s: &str) -> DashResult<KpiKind> {
    match s.to_lowercase().as_str() {
        "app" | "app_adoption" => Ok(KpiKind::AppAdoption),
        "ticket" | "tickets" | "late_tickets" => Ok(KpiKind::LateTickets),
        _ => UnknownKindSnafu { kind: s }.fail(),
    }
}

/// Merges the command line with the optional config file.
pub fn build_settings(args: &Args) -> DashResult<DashSettings> {
    let (config, config_dir) = match args.config.as_deref() {
        Some(p) => {
            let config = read_config(p)?;
            info!("config: {:?}", config);
            let dir = Path::new(p).parent().map(|d| d.to_path_buf());
            (config, dir)
        }
        None => (DashConfig::default(), None),
    };

    let kind = match args.kind.as_deref().or(config.kind.as_deref()) {
        Some(s) => parse_kind(s)?,
        None => KpiKind::AppAdoption,
    };

    // A file path from the config is relative to the config file.
    let input: String = match (&args.input, &config.file_path, &config_dir) {
        (Some(p), _, _) => p.clone(),
        (None, Some(p), Some(dir)) if Path::new(p).is_relative() => {
            dir.join(p).display().to_string()
        }
        (None, Some(p), _) => p.clone(),
        (None, None, _) => return MissingInputSnafu {}.fail(),
    };

    let input_type = match args.input_type.as_deref().or(config.input_type.as_deref()) {
        Some(s) => InputType::parse(s)?,
        None => InputType::detect(&input)?,
    };

    let unit = UnitFilter::from_choice(args.unit.as_deref().or(config.unit.as_deref()));

    let output_directory: PathBuf = args
        .output_directory
        .clone()
        .or(config.output_directory.clone())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));

    Ok(DashSettings {
        kind,
        input,
        input_type,
        excel_worksheet_name: args
            .excel_worksheet_name
            .clone()
            .or(config.excel_worksheet_name),
        unit,
        list_units: args.list_units,
        report: args.report || config.report.unwrap_or(false),
        charts: args.charts || config.charts.unwrap_or(false),
        output_directory,
        out: args.out.clone(),
        reference: args.reference.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn command_line_only() {
        let args = Args::parse_from(["kpidash", "-i", "data/yeu_cau.xlsx", "-k", "ticket", "--report"]);
        let s = build_settings(&args).unwrap();
        assert_eq!(s.kind, KpiKind::LateTickets);
        assert_eq!(s.input_type, InputType::Xlsx);
        assert_eq!(s.unit, UnitFilter::All);
        assert!(s.report);
        assert!(!s.charts);
        assert_eq!(s.output_directory, PathBuf::from("."));
    }

    #[test]
    fn config_file_is_merged() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("dash.json");
        fs::write(
            &config_path,
            r#"{"kind": "app", "filePath": "app.csv", "unit": "Điện lực A", "charts": true}"#,
        )
        .unwrap();
        let config_s = config_path.display().to_string();

        let args = Args::parse_from(["kpidash", "-c", config_s.as_str()]);
        let s = build_settings(&args).unwrap();
        assert_eq!(s.kind, KpiKind::AppAdoption);
        assert_eq!(s.input, dir.path().join("app.csv").display().to_string());
        assert_eq!(s.input_type, InputType::Csv);
        assert_eq!(s.unit, UnitFilter::Unit("Điện lực A".to_string()));
        assert!(s.charts);

        let all_units = format!("--unit={}", UnitFilter::ALL_LABEL);
        let args = Args::parse_from([
            "kpidash",
            "-c",
            config_s.as_str(),
            all_units.as_str(),
            "-k",
            "ticket",
        ]);
        let s = build_settings(&args).unwrap();
        assert_eq!(s.kind, KpiKind::LateTickets);
        assert_eq!(s.unit, UnitFilter::All);
    }

    #[test]
    fn bad_settings() {
        let args = Args::parse_from(["kpidash"]);
        assert!(matches!(
            build_settings(&args),
            Err(DashError::MissingInput {})
        ));

        let args = Args::parse_from(["kpidash", "-i", "x.csv", "-k", "sales"]);
        assert!(matches!(
            build_settings(&args),
            Err(DashError::UnknownKind { .. })
        ));

        let args = Args::parse_from(["kpidash", "-i", "x.ods"]);
        assert!(matches!(
            build_settings(&args),
            Err(DashError::UnknownInputType { .. })
        ));
    }
}
