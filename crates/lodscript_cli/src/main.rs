use clap::{CommandFactory, Parser};

use crate::cli::{Cli, TopLevel, DisassembleCommand, OutputModeCli};

mod cli;

fn init_logging(verbose: u8) {
    let default_filter = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::init_from_env(env_logger::Env::default().default_filter_or(default_filter));
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Some(TopLevel::Disassemble { command }) => match command {
            DisassembleCommand::File {
                path,
                meta,
                mode,
                hex_dump,
            } => {
                let mode = match mode {
                    OutputModeCli::Listing => lodscript_lib::OutputMode::Listing,
                    OutputModeCli::Yaml => lodscript_lib::OutputMode::Yaml,
                };
                let meta = match std::fs::read_to_string(&meta) {
                    Ok(src) => match lodscript_lib::ScriptMeta::from_yaml(&src) {
                        Ok(meta) => meta,
                        Err(e) => {
                            eprintln!("failed to parse {meta:?}: {e}");
                            std::process::exit(1);
                        }
                    },
                    Err(e) => {
                        eprintln!("failed to read {meta:?}: {e}");
                        std::process::exit(1);
                    }
                };
                log::info!("Loaded {} method signatures", meta.methods.len());

                match std::fs::read(&path) {
                    Ok(bytes) => match lodscript_lib::disassemble_with_options(
                        &bytes,
                        &meta,
                        lodscript_lib::DisassembleOptions { mode, hex_dump },
                    ) {
                        Ok(out) => {
                            print!("{out}");
                        }
                        Err(e) => {
                            eprintln!("disassemble error: {e}");
                            std::process::exit(1);
                        }
                    },
                    Err(e) => {
                        eprintln!("failed to read {path:?}: {e}");
                        std::process::exit(1);
                    }
                }
            }
        },
        Some(TopLevel::Completion { shell }) => {
            let mut cmd = Cli::command();
            let bin_name = cmd.get_name().to_string();
            clap_complete::generate(shell, &mut cmd, bin_name, &mut std::io::stdout());
        }
        None => {
            Cli::command().print_help().unwrap();
        }
    }
}
