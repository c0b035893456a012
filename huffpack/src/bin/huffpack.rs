use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use huffpack::{build_encoding_map, build_frequency_map, Codec, Config, HuffmanTree, Source};

#[derive(Parser)]
#[command(name = "huffpack", about = "Static Huffman file compression", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all log output
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Extension of compressed files
    #[arg(long, global = true, default_value = "huf")]
    extension: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress FILE into FILE.huf
    Compress {
        file: PathBuf,

        /// Print the code bits to stdout
        #[arg(long)]
        print_bits: bool,
    },

    /// Decompress FILE.huf into FILE_unc
    Decompress { file: PathBuf },

    /// Print the code table of FILE
    Codes { file: PathBuf },
}

fn init_tracing(cli: &Cli) {
    // Off unless --verbose; RUST_LOG only refines --verbose.
    let filter = if cli.quiet || !cli.verbose {
        tracing_subscriber::EnvFilter::new("off")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> huffpack::Result<()> {
    let codec = Codec::with_config(Config {
        compressed_extension: cli.extension,
        ..Config::default()
    });

    match cli.command {
        Commands::Compress { file, print_bits } => {
            let bits = codec.compress(&file)?;
            if print_bits {
                println!("{bits}");
            }
            eprintln!(
                "{} -> {} ({} bits)",
                file.display(),
                codec.compressed_path(&file).display(),
                bits.len()
            );
        }
        Commands::Decompress { file } => {
            let decoded = codec.decompress(&file)?;
            eprintln!(
                "{} -> {} ({} bytes)",
                file.display(),
                codec.decompressed_path(&file).display(),
                decoded.len()
            );
        }
        Commands::Codes { file } => {
            let freq = build_frequency_map(Source::File(&file))?;
            let tree = HuffmanTree::build(&freq)?;
            print!("{}", build_encoding_map(&tree).to_debug_string());
            println!("leaves: {} depth: {}", tree.leaf_count(), tree.depth());
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
