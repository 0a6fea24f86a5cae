use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser as ClapParser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use teenytiny::{CompilerError, Config, Lexer, OutputFormat, Token};

#[derive(ClapParser)]
#[command(author, version, about = "Teeny Tiny lexer")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Configuration file (defaults to ~/.ttc/config.json)
    #[arg(long, global = true, env = "TTC_CONFIG")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lex a Teeny Tiny program and print its tokens
    Lex {
        /// Source file to lex
        #[arg(required_unless_present = "source", conflicts_with = "source")]
        file: Option<PathBuf>,
        /// Lex this text instead of a file
        #[arg(long)]
        source: Option<String>,
        /// Output format, overriding the config file
        #[arg(long, value_enum)]
        format: Option<OutputFormat>,
        /// Print each token's text next to its kind
        #[arg(long)]
        show_text: bool,
    },
    /// Manage the ttc configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Write a configuration file with defaults
    Init,
    /// Print the configuration file path
    Path,
}

fn init_logging(verbose: bool) -> Result<(), CompilerError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));

    let layer = fmt::layer()
        .with_writer(io::stderr)
        .with_target(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init()
        .map_err(|e| CompilerError::Config(format!("Failed to initialize logging: {}", e)))
}

fn read_source(path: &Path) -> Result<String, CompilerError> {
    if !path.is_file() {
        return Err(CompilerError::FileNotFound(format!(
            "Source file not found: {}",
            path.display()
        )));
    }

    Ok(fs::read_to_string(path)?)
}

fn render(token: &Token, show_text: bool) -> String {
    if show_text {
        format!("{}\t{:?}", token.kind, token.text)
    } else {
        token.kind.to_string()
    }
}

fn lex(path: PathBuf, source: &str, format: OutputFormat, show_text: bool) -> Result<(), CompilerError> {
    debug!(path = %path.display(), ?format, "lexing");
    let lexer = Lexer::new(source);
    let mut out = io::stdout().lock();

    match format {
        OutputFormat::Json => {
            let tokens = lexer
                .tokenize()
                .map_err(|source| CompilerError::Lexing { path, source })?;
            serde_json::to_writer_pretty(&mut out, &tokens)?;
            writeln!(out)?;
        }
        OutputFormat::Text => {
            // Tokens are printed as they are lexed, so output up to an error survives.
            for token in lexer {
                let token = token.map_err(|source| CompilerError::Lexing {
                    path: path.clone(),
                    source,
                })?;
                if token.is_eof() {
                    break;
                }
                writeln!(out, "{}", render(&token, show_text))?;
            }
        }
    }

    Ok(())
}

fn config_command(command: ConfigCommands, path: &Path, config: &Config) -> Result<(), CompilerError> {
    match command {
        ConfigCommands::Show => {
            println!("{}", serde_json::to_string_pretty(config)?);
        }
        ConfigCommands::Init => {
            if path.exists() {
                println!("Config file already exists at: {}", path.display());
            } else {
                Config::default().save_to(path)?;
                info!(path = %path.display(), "wrote default config");
                println!("Initialized new config file at: {}", path.display());
            }
        }
        ConfigCommands::Path => {
            println!("{}", path.display());
        }
    }

    Ok(())
}

fn run(cli: Cli) -> Result<(), CompilerError> {
    let config_path = cli.config.unwrap_or_else(Config::get_config_path);
    let config = Config::load_from(&config_path)?;
    debug!(path = %config_path.display(), ?config, "loaded config");

    match cli.command {
        Commands::Lex {
            file,
            source,
            format,
            show_text,
        } => {
            let (path, source) = match (file, source) {
                (Some(path), _) => {
                    let source = read_source(&path)?;
                    (path, source)
                }
                (None, Some(source)) => (PathBuf::from("<source>"), source),
                (None, None) => {
                    return Err(CompilerError::FileNotFound(
                        "No source file or --source text given".to_string(),
                    ))
                }
            };
            let format = format.unwrap_or(config.format);
            lex(path, &source, format, show_text || config.show_text)
        }
        Commands::Config { command } => config_command(command, &config_path, &config),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
