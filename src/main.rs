use clap::{Args, Parser, Subcommand};
use eyre::{ensure, Context, Result};
use std::path::PathBuf;
use tracing::{info, trace};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use xtsaes::{
    kat::{self, KatSummary},
    xts::{tweak_from_sequence_number, AesCipher, Block, KeySize, AES_BLOCK_SIZE},
    XtsContext, XtsKey,
};
use zeroize::Zeroizing;

#[derive(Parser)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct Transform {
    /// Combined `Key1 || Key2` key, 32 or 64 bytes as hex
    #[arg(short = 'k', long)]
    key: String,
    /// 16 byte tweak as hex
    #[arg(short = 't', long, conflicts_with = "sector", required_unless_present = "sector")]
    tweak: Option<String>,
    /// Data unit sequence number, used as a little-endian tweak
    #[arg(short = 's', long)]
    sector: Option<u128>,
    /// Data unit as hex, at least 16 bytes
    #[arg(index = 1)]
    data: String,
}

#[derive(Subcommand)]
enum Command {
    Encrypt(Transform),
    Decrypt(Transform),
    /// Run NIST CAVP XTS response files
    Kat {
        #[arg(index = 1, required = true)]
        files: Vec<PathBuf>,
    },
    /// Print a random combined key
    Keygen {
        #[arg(short = 'b', long, default_value_t = 256)]
        bits: usize,
    },
}

impl Transform {
    fn context(&self) -> Result<XtsContext> {
        let combined = Zeroizing::new(hex::decode(&self.key).wrap_err("Key is not valid hex")?);
        let key = XtsKey::from_combined(&combined)?;
        Ok(XtsContext::<AesCipher>::new(&key)?)
    }

    fn tweak(&self) -> Result<Block> {
        match (&self.tweak, self.sector) {
            (Some(tweak), _) => {
                let tweak = hex::decode(tweak).wrap_err("Tweak is not valid hex")?;
                ensure!(
                    tweak.len() == AES_BLOCK_SIZE,
                    "Tweak must be {} bytes, got {}",
                    AES_BLOCK_SIZE,
                    tweak.len()
                );
                let mut block = [0; AES_BLOCK_SIZE];
                block.copy_from_slice(&tweak);
                Ok(block)
            }
            (None, Some(sector)) => Ok(tweak_from_sequence_number(sector)),
            (None, None) => eyre::bail!("Either --tweak or --sector is required"),
        }
    }

    fn data(&self) -> Result<Vec<u8>> {
        hex::decode(&self.data).wrap_err("Data is not valid hex")
    }
}

fn run_kat(files: &[PathBuf]) -> Result<KatSummary> {
    let mut total = KatSummary::default();
    for path in files {
        let input = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Couldn't read response file {path:?}"))?;
        let vectors = kat::parse_rsp(&input)
            .wrap_err_with(|| format!("Couldn't parse response file {path:?}"))?;
        let summary = kat::run_all(&vectors)
            .wrap_err_with(|| format!("Response file {path:?} contains a broken vector"))?;
        println!("{}: {}", path.display(), summary);
        total.merge(summary);
    }
    Ok(total)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();
    trace!("Starting up xtsaes cli");
    match cli.command {
        Command::Encrypt(args) => {
            let ctx = args.context()?;
            let ciphertext = ctx
                .encrypt(&args.data()?, &args.tweak()?)
                .wrap_err("Failed to encrypt data unit")?;
            println!("{}", hex::encode(ciphertext));
        }
        Command::Decrypt(args) => {
            let ctx = args.context()?;
            let plaintext = Zeroizing::new(
                ctx.decrypt(&args.data()?, &args.tweak()?)
                    .wrap_err("Failed to decrypt data unit")?,
            );
            println!("{}", hex::encode(&*plaintext));
        }
        Command::Kat { files } => {
            let total = run_kat(&files)?;
            info!("KAT total: {}", total);
            if files.len() > 1 {
                println!("total: {total}");
            }
            if !total.is_success() {
                std::process::exit(1);
            }
        }
        Command::Keygen { bits } => {
            let size = match bits {
                256 => KeySize::Aes128,
                512 => KeySize::Aes256,
                _ => eyre::bail!("Combined key size must be 256 or 512 bits, got {bits}"),
            };
            let key = XtsKey::random(size);
            println!("{}", hex::encode(&*key.to_combined()));
        }
    }
    Ok(())
}
