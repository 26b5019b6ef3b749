use clap::Parser;

/// Ranks customer-service KPI exports, draws the charts and writes the Word report.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) A JSON file with the settings of the run. The command line options
    /// override the values of the file.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (file path) The spreadsheet export to analyse (.xlsx or .csv).
    #[clap(short, long, value_parser)]
    pub input: Option<String>,

    /// (app or ticket, default app) The analysis to run: app adoption or late customer requests.
    #[clap(short, long, value_parser)]
    pub kind: Option<String>,

    /// (xlsx or csv) The type of the input. By default it is deduced from the file extension.
    #[clap(long, value_parser)]
    pub input_type: Option<String>,

    /// (default: first worksheet) When using an Excel file, indicates the name of the worksheet to use.
    #[clap(long, value_parser)]
    pub excel_worksheet_name: Option<String>,

    /// (unit name, optional) Only keep the rows of this unit. The value "-- Tất cả --" keeps all rows.
    #[clap(short, long, value_parser, allow_hyphen_values = true)]
    pub unit: Option<String>,

    /// If passed as an argument, prints the names that can be given to --unit and stops.
    #[clap(long, takes_value = false)]
    pub list_units: bool,

    /// If passed as an argument, writes the Word report in the output directory.
    #[clap(long, takes_value = false)]
    pub report: bool,

    /// If passed as an argument, writes the three charts as PNG files in the output directory.
    #[clap(long, takes_value = false)]
    pub charts: bool,

    /// (directory, default .) Where the report and the charts are written.
    #[clap(long, value_parser)]
    pub output_directory: Option<String>,

    /// (file path, 'stdout' or empty) If specified, the summary of the ranking will be written in JSON format to the given
    /// location.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path) A reference file containing a summary in JSON format. If provided, kpidash will
    /// check that the computed summary matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
