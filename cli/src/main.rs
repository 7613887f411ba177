use std::fs::File;
use std::io::{BufWriter, Write};

use clap::Parser;
use nar_cli::{normalize_path, open_nar, Args, Command};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut tracing = nar_tracing::TracingBuilder::default().level(args.log_level);
    if !args.no_progress {
        tracing = tracing.enable_progressbar();
    }
    let tracing_handle = tracing.build()?;

    let stdout = BufWriter::new(tracing_handle.get_stdout_writer());

    match args.command {
        Command::Cat { nar, path } => {
            nar_cli::cat(open_nar(&nar)?, normalize_path(&path).as_ref(), stdout)?;
        }
        Command::Ls {
            nar,
            path,
            recursive,
            long,
        } => {
            nar_cli::ls(
                open_nar(&nar)?,
                normalize_path(&path).as_ref(),
                recursive,
                long,
                stdout,
            )?;
        }
        Command::DumpPath { path, output } => match output {
            Some(output) => {
                let mut w = BufWriter::new(File::create(output)?);
                nar_cli::dump_path(&path, &mut w)?;
                w.into_inner()?.sync_all()?;
            }
            None => nar_cli::dump_path(&path, stdout)?,
        },
        Command::Restore { nar, dest } => {
            nar_cli::restore(open_nar(&nar)?, &dest)?;
        }
        Command::Hash { nar } => {
            let nar_hash = nar_cli::hash(open_nar(&nar)?)?;
            let mut stdout = stdout;
            writeln!(stdout, "{}\t{}", nar_hash, nar_hash.size)?;
            stdout.flush()?;
        }
    }

    Ok(())
}
