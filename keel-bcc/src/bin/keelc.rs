//! Command-line entry point. Exit code is the number of errors.

use clap::{Parser, ValueEnum};
use keel_bcc::driver;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "keelc", version, about = "keel bytecode class compiler")]
struct Args {
    /// Source file to compile.
    #[arg(short = 'f', long = "file")]
    file: PathBuf,

    /// Directory the class-file tree is written under.
    #[arg(short = 'b', long = "build-path", default_value = ".")]
    build_path: PathBuf,

    /// Also compile the transitive import closure.
    #[arg(long)]
    compile_imports: bool,

    /// Log verbosity.
    #[arg(long, value_enum, default_value = "warning")]
    log_level: LogLevel,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    fn as_level(self) -> tracing::Level {
        match self {
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warning => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_max_level(args.log_level.as_level())
        .with_writer(std::io::stderr)
        .init();

    let runs = if args.compile_imports {
        driver::compile_with_imports(&args.file, &args.build_path)
    } else {
        vec![(
            args.file.clone(),
            driver::compile_file(&args.file, &args.build_path),
        )]
    };

    let mut error_count = 0usize;
    for (path, result) in runs {
        match result {
            Ok(outcome) => {
                for error in &outcome.errors {
                    eprintln!("{}: {error}", path.display());
                }
                error_count += outcome.errors.len();
                if outcome.errors.is_empty() {
                    if let Some(output) = &outcome.output {
                        println!(
                            "compiled '{}' -> '{}'",
                            path.display(),
                            output.display()
                        );
                    }
                }
            }
            Err(error) => {
                eprintln!("{}: {error}", path.display());
                error_count += 1;
            }
        }
    }
    ExitCode::from(error_count.min(255) as u8)
}
