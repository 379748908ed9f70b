//! qrseal CLI - encrypt short messages into QR-sized text payloads
//!
//! Command-line interface for sealing a message under a password (PBKDF2 +
//! AES-256-GCM) into text suitable for a QR encoder, and for opening the text
//! a QR decoder produced.

use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

use qrseal::error::{ErrorCategory, ErrorKind, QrsealError, Result};
use qrseal::file_ops;
use qrseal::rawkey::RawKey;
use qrseal::secret::{PipedSecret, Scheme, SecretSource, TerminalPrompt};

#[derive(Parser)]
#[command(name = "qrseal")]
#[command(version)]
#[command(about = "Password-based message encryption for QR codes.", long_about = None)]
struct Cli {
    /// Read the password (or raw key) from stdin instead of from terminal
    #[arg(long, global = true)]
    passphrase_stdin: bool,

    /// Use a base64 256-bit raw key instead of a password
    #[arg(long, global = true)]
    raw_key: bool,

    /// Log debug detail to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt a message into payload text
    #[command(alias = "e")]
    Encrypt {
        /// Path to the file holding the message to encrypt
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Path to write the payload text to (stdout if omitted)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Decrypt payload text, e.g. as read from a QR code
    #[command(alias = "d")]
    Decrypt {
        /// Path to the file holding the payload text
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Path to write the decrypted message to (stdout if omitted)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Replace the message in a payload file, while validating
    /// that the password is not accidentally changed.
    #[command(alias = "u")]
    Update {
        /// Path to the file holding the new message
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Path to the existing payload file to replace
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Generate a random raw key for use with --raw-key
    Keygen {
        /// Path to write the base64 key to (stdout if omitted)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let scheme = if cli.raw_key {
        Scheme::RawKey
    } else {
        Scheme::Password
    };

    let result = match cli.command {
        Commands::Encrypt { input, output } => {
            let mut source = secret_source(cli.passphrase_stdin, scheme);
            file_ops::encrypt_file(&input, scheme, &mut *source)
                .and_then(|text| emit(output.as_deref(), format!("{}\n", text).as_bytes()))
        }
        Commands::Decrypt { input, output } => {
            let mut source = secret_source(cli.passphrase_stdin, scheme);
            file_ops::decrypt_file(&input, scheme, &mut *source)
                .and_then(|message| emit(output.as_deref(), message.as_bytes()))
        }
        Commands::Update { input, output } => {
            let mut source = secret_source(cli.passphrase_stdin, scheme);
            file_ops::update_file(&input, &output, scheme, &mut *source)
        }
        Commands::Keygen { output } => RawKey::generate().and_then(|key| {
            let encoded = key.to_base64();
            emit(output.as_deref(), format!("{}\n", encoded.as_str()).as_bytes())
        }),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", render_chain(&e));
        process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "qrseal=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn secret_source(use_stdin: bool, scheme: Scheme) -> Box<dyn SecretSource> {
    if use_stdin {
        Box::new(PipedSecret::new(io::stdin()))
    } else {
        Box::new(TerminalPrompt::new(scheme))
    }
}

/// Write to `path` with owner-only permissions, or to stdout.
fn emit(path: Option<&Path>, contents: &[u8]) -> Result<()> {
    match path {
        Some(path) => file_ops::write_file_secure(path, contents)
            .map_err(|e| e.with_context(format!("failed to write to {}", path.display()))),
        None => {
            let mut stdout = io::stdout().lock();
            stdout
                .write_all(contents)
                .and_then(|()| stdout.flush())
                .map_err(|e| {
                    QrsealError::with_kind_and_source(
                        ErrorCategory::Internal,
                        ErrorKind::Io,
                        "failed to write to stdout",
                        e,
                    )
                })
        }
    }
}

/// "outer: inner: innermost", following the source chain.
fn render_chain(err: &QrsealError) -> String {
    let mut rendered = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        rendered.push_str(": ");
        rendered.push_str(&inner.to_string());
        source = inner.source();
    }
    rendered
}
