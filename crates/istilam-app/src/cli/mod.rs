use clap::{ArgAction, Args, CommandFactory, Parser, Subcommand};

/// Top-level CLI entry point.
#[derive(Debug, Parser)]
#[command(
    name = "istilam",
    version,
    author,
    about = "Traffic-violation enquiry service for the Kuwait MOI portal"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
    /// Increase logging verbosity (-v, -vv, -vvv).
    #[arg(global = true, short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            command: None,
            verbose: 0,
        }
    }
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    pub fn print_help() {
        let mut cmd = Cli::command();
        let _ = cmd.print_help();
        println!();
    }
}

/// Supported subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the istilam HTTP server.
    Serve(ServeArgs),
    /// Perform a one-shot enquiry and print the result as JSON.
    Enquire(EnquireArgs),
}

#[derive(Debug, Args)]
pub struct ServeArgs;

/// One-shot portal enquiry.
#[derive(Debug, Args)]
pub struct EnquireArgs {
    /// Civil ID to enquire for.
    #[arg(long = "civil-id", value_name = "ID")]
    pub civil_id: String,
    /// Optional vehicle plate number.
    #[arg(long, value_name = "PLATE")]
    pub plate: Option<String>,
    /// Run the browser with a visible window.
    #[arg(long)]
    pub headful: bool,
}
