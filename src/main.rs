use clap::{ArgAction, Parser, Subcommand};
use kara::{EditorConfig, KaraError, ManualTimerHost, Session};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kara", version, about = "Time karaoke lyrics with ruby annotations")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log more (-v info, -vv debug, -vvv trace). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Print the parsed document as YAML.
    Inspect {
        file: PathBuf,
        /// Declared encoding of the input.
        #[arg(long, default_value = "shift_jis")]
        encoding: String,
    },

    /// Parse and re-serialize a lyrics file.
    Export {
        file: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long, default_value = "shift_jis")]
        encoding: String,
        /// Encoding of the output; defaults to the input encoding.
        #[arg(long)]
        output_encoding: Option<String>,
    },

    /// Run a command script against a lyrics file and export the result.
    Tag {
        file: PathBuf,
        /// Script file, one command per line.
        #[arg(long)]
        script: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Editor configuration (YAML).
        #[arg(long)]
        config: Option<PathBuf>,
        /// Declared encoding of the input; overrides the configuration.
        #[arg(long)]
        encoding: Option<String>,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn read(path: &Path) -> Result<Vec<u8>, KaraError> {
    fs::read(path).map_err(|e| {
        KaraError::Io(std::io::Error::new(
            e.kind(),
            format!("Error reading '{}': {}", path.display(), e),
        ))
    })
}

fn write_output(output: Option<&Path>, bytes: &[u8]) -> Result<(), KaraError> {
    match output {
        Some(path) => {
            fs::write(path, bytes)?;
            eprintln!("Wrote {}", path.display());
        }
        None => std::io::stdout().write_all(bytes)?,
    }
    Ok(())
}

fn run(cli: Cli) -> Result<(), KaraError> {
    match cli.command {
        Command::Inspect { file, encoding } => {
            let source = kara::encoding::decode(&read(&file)?, &encoding)?;
            let doc = kara::parse(&source);
            let yaml = serde_yaml::to_string(&doc).map_err(|e| KaraError::Output(e.to_string()))?;
            print!("{}", yaml);
        }
        Command::Export {
            file,
            output,
            encoding,
            output_encoding,
        } => {
            let text = kara::reformat_bytes(&read(&file)?, &encoding)?;
            let label = output_encoding.as_deref().unwrap_or(&encoding);
            let bytes = kara::encoding::encode(&text, label)?;
            write_output(output.as_deref(), &bytes)?;
        }
        Command::Tag {
            file,
            script,
            output,
            config,
            encoding,
        } => {
            let config = match config {
                Some(path) => EditorConfig::load(path)?,
                None => EditorConfig::default(),
            };
            let label = encoding.unwrap_or_else(|| config.encoding.clone());
            let script = String::from_utf8_lossy(&read(&script)?).into_owned();

            let mut session = Session::new(config, ManualTimerHost::new());
            session.load_document(&read(&file)?, &label)?;
            let executed = session.run_script(&script)?;
            info!(commands = executed, "Script finished");

            let bytes = session.export_document()?;
            write_output(output.as_deref(), &bytes)?;
        }
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
