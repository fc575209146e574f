use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum, builder::{Styles, styling::{AnsiColor, Effects}}, crate_description, crate_version};
use clap_complete::Shell;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputModeCli {
    Listing,
    Yaml,
}

#[derive(Parser)]
#[command(name = "lodscript",
    version = crate_version!(),
    about = crate_description!(),
    styles = Styles::styled()
        .header(AnsiColor::BrightGreen.on_default() | Effects::BOLD | Effects::UNDERLINE)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightCyan.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Cyan.on_default()))]
pub struct Cli {
    /// Increase diagnostic output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<TopLevel>,
}

#[derive(Subcommand)]
pub enum TopLevel {
    /// Disassembles a compiled script
    Disassemble {
        #[command(subcommand)]
        command: DisassembleCommand,
    },
    /// Generate shell completion
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum DisassembleCommand {
    /// Disassembles a compiled script file
    File {
        /// Path to the compiled script
        path: PathBuf,

        /// Path to the call-signature metadata (YAML)
        #[arg(long)]
        meta: PathBuf,

        /// Output mode
        #[arg(long, value_enum, default_value_t = OutputModeCli::Listing)]
        mode: OutputModeCli,

        /// Prefix listing lines with the raw words of each token
        #[arg(long, default_value_t = false)]
        hex_dump: bool,
    }
}
