//! Sealframe command-line front end.
//!
//! Thin layer over [`sealframe_core::Crypto`]: every command loads its
//! inputs from files, calls one facade operation and writes the result.
//! Private keys on disk are always password-encrypted exports.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod error;

use std::{
    ffi::OsString,
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use clap::{Parser, Subcommand, ValueEnum};
use sealframe_core::{
    Crypto, CryptoConfig, EnvelopeRecipient, Environment, FingerprintAlgorithm, PrivateKey,
    PublicKey, TracingSink,
};

pub use crate::error::CliError;

/// Sealframe envelope and signature tool
#[derive(Parser, Debug)]
#[command(name = "sealframe")]
#[command(about = "Multi-recipient file encryption and signatures")]
#[command(version)]
pub struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", global = true)]
    pub log_level: String,

    /// Fingerprint scheme for recipient identifiers
    #[arg(long, value_enum, default_value_t = Fingerprint::Sha256, global = true)]
    pub fingerprint: Fingerprint,

    /// Segment size in bytes for streamed envelope bodies
    #[arg(long, default_value_t = 64 * 1024, global = true)]
    pub buffer_size: usize,

    /// Command to run
    #[command(subcommand)]
    pub command: Command,
}

/// Recipient identifier scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Fingerprint {
    /// Full SHA-256 digest
    Sha256,
    /// First 8 bytes of SHA-512
    Sha512Truncated,
}

/// CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate a keypair: `<out>.key` (password-encrypted) and `<out>.pub`
    Keygen {
        /// Output path prefix
        #[arg(short, long)]
        out: PathBuf,

        /// File holding the password that protects the private key
        #[arg(long)]
        password_file: PathBuf,
    },

    /// Encrypt a file for public keys and/or a password
    Encrypt {
        /// Plaintext input
        #[arg(short, long)]
        input: PathBuf,

        /// Envelope output
        #[arg(short, long)]
        output: PathBuf,

        /// Recipient public key file (repeatable)
        #[arg(short, long = "recipient")]
        recipients: Vec<PathBuf>,

        /// Also let anyone with this password decrypt
        #[arg(long)]
        password_file: Option<PathBuf>,

        /// Sign the plaintext with this private key file
        #[arg(long, requires = "sign_key_password_file")]
        sign_key: Option<PathBuf>,

        /// Password for the signing key file
        #[arg(long, requires = "sign_key")]
        sign_key_password_file: Option<PathBuf>,
    },

    /// Decrypt an envelope with a private key or a password
    Decrypt {
        /// Envelope input
        #[arg(short, long)]
        input: PathBuf,

        /// Plaintext output (removed again if decryption fails)
        #[arg(short, long)]
        output: PathBuf,

        /// Private key file
        #[arg(short, long, requires = "key_password_file", conflicts_with = "password_file")]
        key: Option<PathBuf>,

        /// Password for the private key file
        #[arg(long)]
        key_password_file: Option<PathBuf>,

        /// Envelope password
        #[arg(long)]
        password_file: Option<PathBuf>,

        /// Require a valid signature from this public key file (repeatable;
        /// any one of them suffices)
        #[arg(long = "verify", requires = "key")]
        verifiers: Vec<PathBuf>,
    },

    /// Write a detached signature over a file
    Sign {
        /// File to sign
        #[arg(short, long)]
        input: PathBuf,

        /// Signature output
        #[arg(short, long)]
        output: PathBuf,

        /// Private key file
        #[arg(short, long)]
        key: PathBuf,

        /// Password for the private key file
        #[arg(long)]
        key_password_file: PathBuf,
    },

    /// Check a detached signature
    Verify {
        /// Signed file
        #[arg(short, long)]
        input: PathBuf,

        /// Signature file
        #[arg(short, long)]
        signature: PathBuf,

        /// Signer public key file
        #[arg(short = 'p', long)]
        public_key: PathBuf,
    },

    /// Print the recipient identifier of a public key
    Fingerprint {
        /// Public key file
        #[arg(short = 'p', long)]
        public_key: PathBuf,
    },
}

impl Cli {
    /// Facade configuration for these flags.
    pub fn config(&self) -> CryptoConfig {
        let fingerprint = match self.fingerprint {
            Fingerprint::Sha256 => FingerprintAlgorithm::Sha256,
            Fingerprint::Sha512Truncated => FingerprintAlgorithm::Sha512Truncated,
        };
        CryptoConfig {
            fingerprint,
            stream_buffer_size: self.buffer_size,
            ..CryptoConfig::default()
        }
        .with_diagnostics(Arc::new(TracingSink))
    }
}

/// Run one command. Human-readable results go to `stdout`.
pub fn run(cli: Cli, stdout: &mut impl Write) -> Result<(), CliError> {
    let crypto = Crypto::new(cli.config())?;
    run_with(&crypto, cli.command, stdout)
}

/// Run one command against an existing facade.
pub fn run_with<E: Environment>(
    crypto: &Crypto<E>,
    command: Command,
    stdout: &mut impl Write,
) -> Result<(), CliError> {
    match command {
        Command::Keygen { out, password_file } => {
            let password = read_password(&password_file)?;
            let pair = crypto.generate_keypair()?;

            let private_key = crypto.export_private_key(pair.private_key(), &password)?;
            write_file(&with_suffix(&out, ".key"), &private_key)?;
            write_file(&with_suffix(&out, ".pub"), &crypto.export_public_key(pair.public_key())?)?;

            let id = crypto.key_identifier(pair.public_key())?;
            tracing::info!(key_id = %id, "generated keypair");
            writeln!(stdout, "{id}").map_err(CliError::Stdout)?;
        },
        Command::Encrypt {
            input,
            output,
            recipients,
            password_file,
            sign_key,
            sign_key_password_file,
        } => {
            let keys = load_publics(crypto, &recipients)?;
            let password = password_file.as_deref().map(read_password).transpose()?;
            let signer = match (sign_key, sign_key_password_file) {
                (Some(key), Some(key_password)) => {
                    Some(load_private(crypto, &key, &key_password)?)
                },
                _ => None,
            };

            let mut targets: Vec<_> = keys.iter().map(EnvelopeRecipient::Key).collect();
            if let Some(password) = &password {
                targets.push(EnvelopeRecipient::Password(password.as_slice()));
            }
            if targets.is_empty() {
                return Err(CliError::Usage {
                    reason: "need at least one --recipient or --password-file".into(),
                });
            }

            let mut reader = BufReader::new(File::open(&input).map_err(CliError::file(&input))?);
            let mut writer = create(&output)?;
            let written = match &signer {
                Some(signer) => {
                    crypto.sign_then_encrypt_stream(&mut reader, &mut writer, signer, &targets)?
                },
                None => crypto.encrypt_stream(&mut reader, &mut writer, &targets)?,
            };
            writer.flush().map_err(CliError::file(&output))?;
            tracing::info!(
                bytes = written,
                recipients = targets.len(),
                signed = signer.is_some(),
                "encrypted"
            );
        },
        Command::Decrypt { input, output, key, key_password_file, password_file, verifiers } => {
            let verifiers = load_publics(crypto, &verifiers)?;
            let mut reader = BufReader::new(File::open(&input).map_err(CliError::file(&input))?);
            let mut writer = create(&output)?;

            let result = match (key, key_password_file, password_file) {
                (Some(key), Some(key_password), None) => load_private(crypto, &key, &key_password)
                    .and_then(|key| {
                        if verifiers.is_empty() {
                            return Ok(crypto.decrypt_stream(&mut reader, &mut writer, &key)?);
                        }
                        let verifiers: Vec<&PublicKey> = verifiers.iter().collect();
                        Ok(crypto.decrypt_then_verify_stream(
                            &mut reader,
                            &mut writer,
                            &key,
                            &verifiers,
                        )?)
                    }),
                (None, None, Some(password)) => read_password(&password).and_then(|password| {
                    Ok(crypto.decrypt_stream_with_password(&mut reader, &mut writer, &password)?)
                }),
                _ => Err(CliError::Usage {
                    reason: "give either --key with --key-password-file, or --password-file".into(),
                }),
            }
            .and_then(|written| {
                writer.flush().map_err(CliError::file(&output))?;
                Ok(written)
            });

            match result {
                Ok(written) => tracing::info!(bytes = written, "decrypted"),
                Err(error) => {
                    drop(writer);
                    // Unauthenticated plaintext must not survive a failed decrypt.
                    if let Err(remove) = fs::remove_file(&output) {
                        tracing::warn!("could not remove {}: {}", output.display(), remove);
                    }
                    return Err(error);
                },
            }
        },
        Command::Sign { input, output, key, key_password_file } => {
            let key = load_private(crypto, &key, &key_password_file)?;
            let mut reader = BufReader::new(File::open(&input).map_err(CliError::file(&input))?);
            let signature = crypto.sign_stream(&mut reader, &key)?;
            write_file(&output, &signature)?;
        },
        Command::Verify { input, signature, public_key } => {
            let key = load_public(crypto, &public_key)?;
            let signature = fs::read(&signature).map_err(CliError::file(&signature))?;
            let mut reader = BufReader::new(File::open(&input).map_err(CliError::file(&input))?);
            crypto.verify_stream(&mut reader, &signature, &key)?;
            writeln!(stdout, "signature ok").map_err(CliError::Stdout)?;
        },
        Command::Fingerprint { public_key } => {
            let key = load_public(crypto, &public_key)?;
            let id = crypto.key_identifier(&key)?;
            writeln!(stdout, "{}", hex::encode(id.as_bytes())).map_err(CliError::Stdout)?;
        },
    }
    Ok(())
}

fn load_public<E: Environment>(crypto: &Crypto<E>, path: &Path) -> Result<PublicKey, CliError> {
    let data = fs::read(path).map_err(CliError::file(path))?;
    Ok(crypto.import_public_key(&data)?)
}

fn load_publics<E: Environment>(
    crypto: &Crypto<E>,
    paths: &[PathBuf],
) -> Result<Vec<PublicKey>, CliError> {
    paths.iter().map(|path| load_public(crypto, path)).collect()
}

fn load_private<E: Environment>(
    crypto: &Crypto<E>,
    path: &Path,
    password_file: &Path,
) -> Result<PrivateKey, CliError> {
    let password = read_password(password_file)?;
    let data = fs::read(path).map_err(CliError::file(path))?;
    Ok(crypto.import_private_key(&data, &password)?)
}

/// Password file contents without the trailing newline.
fn read_password(path: &Path) -> Result<Vec<u8>, CliError> {
    let mut password = fs::read(path).map_err(CliError::file(path))?;
    while matches!(password.last(), Some(b'\n' | b'\r')) {
        password.pop();
    }
    Ok(password)
}

/// `path` with `suffix` appended to its file name, keeping any extension.
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path);
    name.push(suffix);
    PathBuf::from(name)
}

fn create(path: &Path) -> Result<BufWriter<File>, CliError> {
    File::create(path).map(BufWriter::new).map_err(CliError::file(path))
}

fn write_file(path: &Path, data: &[u8]) -> Result<(), CliError> {
    fs::write(path, data).map_err(CliError::file(path))
}
