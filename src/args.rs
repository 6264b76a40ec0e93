use clap::Parser;

/// Reconciles the submission counts of survey forms with the spreadsheets exported by the form provider.
#[derive(Parser, Debug, Clone, Default)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) A JSON configuration file. See the manual for the available options.
    /// The options passed on the command line override the ones from this file.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (file path, repeatable) A spreadsheet exported by the form provider. All the files passed in one
    /// invocation are processed as a single upload.
    #[clap(short, long, value_parser)]
    pub input: Vec<String>,

    /// (file path, default forms.json) The JSON file holding the catalog of forms.
    #[clap(long, value_parser)]
    pub catalog: Option<String>,

    /// (default auto) The type of the inputs: auto, xlsx or csv.
    #[clap(long, value_parser)]
    pub input_type: Option<String>,

    /// (default: first worksheet) When using a workbook, indicates the name of the worksheet to use.
    #[clap(long, value_parser)]
    pub worksheet_name: Option<String>,

    /// (file path, 'stdout' or empty) Where to write the JSON report of the upload.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// If passed as an argument, prints the report and, on the standard error, the changes to the catalog without writing them.
    #[clap(long, takes_value = false)]
    pub dry_run: bool,

    /// If passed as an argument, prints the forms of the catalog and exits.
    #[clap(long, takes_value = false)]
    pub list: bool,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard error.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
