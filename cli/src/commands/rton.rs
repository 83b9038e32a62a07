use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use rton::batch::{self, BatchConfig, BatchJob, BatchReport};
use rton::process::{decode_file, decrypt_file, encode_file, encrypt_file};
use rton::{CipherKey, DecodeOptions};
use std::path::{Path, PathBuf};

/// Key material: either a seed, or an explicit key and IV.
#[derive(Args, Debug)]
pub struct KeyArgs {
    /// Encryption Seed (key and IV are derived from its MD5)
    #[arg(long, conflicts_with_all = ["key", "iv"])]
    seed: Option<String>,
    /// Raw key text (16, 24 or 32 bytes)
    #[arg(long, requires = "iv")]
    key: Option<String>,
    /// Raw IV text (16, 24 or 32 bytes, also the block size)
    #[arg(long, requires = "key")]
    iv: Option<String>,
}

impl KeyArgs {
    fn resolve(&self) -> Result<Option<CipherKey>> {
        match (&self.seed, &self.key, &self.iv) {
            (Some(seed), _, _) => Ok(Some(CipherKey::from_seed(seed))),
            (None, Some(key), Some(iv)) => {
                Ok(Some(CipherKey::new(key.as_bytes(), iv.as_bytes())?))
            }
            (None, None, None) => Ok(None),
            _ => bail!("--key and --iv must be given together"),
        }
    }

    fn require(&self) -> Result<CipherKey> {
        match self.resolve()? {
            Some(key) => Ok(key),
            None => bail!("this command needs --seed or --key/--iv"),
        }
    }
}

#[derive(Subcommand)]
pub enum RtonCommands {
    /// Decode RTON to JSON
    Decode {
        /// Input RTON file
        input: PathBuf,
        /// Output JSON file (optional)
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        key: KeyArgs,
        /// Accept files with a missing DONE footer
        #[arg(long)]
        lenient: bool,
    },
    /// Encode JSON to RTON
    Encode {
        /// Input JSON file
        input: PathBuf,
        /// Output RTON file (optional)
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        key: KeyArgs,
    },
    /// Encrypt RTON/File
    Encrypt {
        /// Input file
        input: PathBuf,
        /// Output file (optional)
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        key: KeyArgs,
    },
    /// Decrypt RTON/File
    Decrypt {
        /// Input file
        input: PathBuf,
        /// Output file (optional)
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        key: KeyArgs,
    },
    /// Decode many RTON files listed as [[src, dst], ...] in a JSON file
    BatchDecode {
        /// JSON pair list
        pairs: PathBuf,
        #[command(flatten)]
        key: KeyArgs,
        #[arg(long)]
        lenient: bool,
        /// Worker threads (defaults to the number of CPUs)
        #[arg(short, long)]
        threads: Option<usize>,
    },
    /// Encode many JSON files listed as [[src, dst], ...] in a JSON file
    BatchEncode {
        /// JSON pair list
        pairs: PathBuf,
        #[command(flatten)]
        key: KeyArgs,
        /// Worker threads (defaults to the number of CPUs)
        #[arg(short, long)]
        threads: Option<usize>,
    },
}

pub fn handle(cmd: RtonCommands) -> Result<()> {
    match cmd {
        RtonCommands::Decode {
            input,
            output,
            key,
            lenient,
        } => {
            let options = DecodeOptions { lenient };
            let key = key.resolve()?;
            let out = decode_file(&input, output.as_deref(), key.as_ref(), &options)?;
            println!("Decoded RTON to {:?}", out);
        }
        RtonCommands::Encode { input, output, key } => {
            let out = encode_file(&input, output.as_deref(), key.resolve()?.as_ref())?;
            println!("Encoded RTON to {:?}", out);
        }
        RtonCommands::Encrypt { input, output, key } => {
            let out = encrypt_file(&input, output.as_deref(), &key.require()?)?;
            println!("Encrypted to {:?}", out);
        }
        RtonCommands::Decrypt { input, output, key } => {
            let out = decrypt_file(&input, output.as_deref(), &key.require()?)?;
            println!("Decrypted to {:?}", out);
        }
        RtonCommands::BatchDecode {
            pairs,
            key,
            lenient,
            threads,
        } => {
            let job = BatchJob::decode(key.resolve()?, DecodeOptions { lenient });
            run_batch(&pairs, &job, threads)?;
        }
        RtonCommands::BatchEncode {
            pairs,
            key,
            threads,
        } => {
            let job = BatchJob::encode(key.resolve()?);
            run_batch(&pairs, &job, threads)?;
        }
    }
    Ok(())
}

fn run_batch(list: &Path, job: &BatchJob, threads: Option<usize>) -> Result<()> {
    let pairs = batch::load_pairs(list)?;
    println!("Processing {} files from {:?}...", pairs.len(), list);

    let report = batch::run(&pairs, job, &BatchConfig { threads })?;
    print_report(&report);
    if !report.is_success() {
        bail!(
            "{} of {} jobs failed",
            report.failures().count(),
            report.outcomes.len()
        );
    }
    Ok(())
}

fn print_report(report: &BatchReport) {
    for outcome in report.failures() {
        if let Err(e) = &outcome.result {
            println!("  failed {:?}: {}", outcome.pair.source, e);
        }
    }
    println!(
        "Batch complete: {} succeeded, {} failed.",
        report.succeeded(),
        report.failures().count()
    );
}
