use clap::{Parser, Subcommand};

/// Random reading groups and oral-exam draws for the classroom, without
/// repeats across sessions.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path) The attendance workbook (xlsx), one worksheet per class group.
    #[clap(short, long, value_parser, default_value = "Classeur_étudiants.xlsx")]
    pub workbook: String,

    /// (directory path) Where the history files are read and written.
    #[clap(long, value_parser, default_value = ".")]
    pub history_dir: String,

    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Lists the worksheets of the workbook.
    Sheets,

    /// Lists the presence (week) columns of a worksheet.
    Weeks {
        /// The worksheet to inspect.
        #[clap(short, long, value_parser)]
        sheet: String,
    },

    /// Draws a third of the present students for an oral exam, skipping the
    /// students selected in past sessions.
    Exam {
        /// The worksheet of the class group.
        #[clap(short, long, value_parser)]
        sheet: String,

        /// The presence column of the targeted week, e.g. "SEMAINE 4".
        #[clap(long, value_parser)]
        week: String,

        /// Forget this sheet's past selections before drawing.
        #[clap(long, takes_value = false)]
        reset: bool,
    },

    /// Draws reading groups, rejecting any grouping already produced for the sheet.
    Groups {
        /// The worksheet of the class group.
        #[clap(short, long, value_parser)]
        sheet: String,

        /// The number of groups to form.
        #[clap(short, long, value_parser = clap::value_parser!(u32).range(2..=20))]
        count: u32,

        /// Forget this sheet's past drawings before generating.
        #[clap(long, takes_value = false)]
        reset: bool,
    },

    /// Displays a selection or grouping history.
    History {
        #[clap(subcommand)]
        kind: HistoryKind,
    },

    /// Imports a legacy per-sheet exam history file (a JSON array of names)
    /// into the unified history.
    Migrate {
        /// The sheet the legacy file was keyed by.
        #[clap(short, long, value_parser)]
        sheet: String,

        /// The legacy file to import.
        #[clap(short, long, value_parser)]
        file: String,
    },

    /// Runs the web dashboard.
    Serve {
        /// The address to listen on.
        #[clap(long, value_parser, default_value = "127.0.0.1:8080")]
        addr: String,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum HistoryKind {
    /// Past exam selections, optionally restricted to one sheet.
    Exam {
        #[clap(short, long, value_parser)]
        sheet: Option<String>,
    },

    /// Past group drawings of a sheet.
    Groups {
        #[clap(short, long, value_parser)]
        sheet: String,
    },
}
