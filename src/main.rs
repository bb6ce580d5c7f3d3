use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::error;

use adcom_etl::config::EtlConfig;
use adcom_etl::logging;
use adcom_etl::pipeline::Etl;

#[derive(Parser)]
#[command(name = "adcom_etl")]
#[command(about = "IPEDS admissions data ETL for the AdCom college explorer")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full ETL and write every JSON artifact
    Run {
        /// Folder containing the source CSV extracts
        #[arg(long)]
        src: PathBuf,
        /// Output folder (e.g. public/data)
        #[arg(long)]
        out: PathBuf,
        /// Optional TOML file overriding source-file names
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() {
    logging::init_logging();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { src, out, config } => {
            let config = match config {
                Some(path) => match EtlConfig::load(&path) {
                    Ok(config) => config,
                    Err(e) => {
                        error!("failed to load config: {}", e);
                        eprintln!("❌ Failed to load config: {e}");
                        std::process::exit(1);
                    }
                },
                None => EtlConfig::default(),
            };

            println!("🚀 Running admissions ETL...");
            let etl = Etl {
                src_dir: src,
                out_dir: out,
                config,
            };
            match etl.run() {
                Ok(summary) => {
                    println!("\n📊 ETL Results:");
                    println!("   Institutions: {}", summary.institutions);
                    println!("   Rejected records: {}", summary.rejected_records);
                    println!("   Survey years: {:?}", summary.years);
                    println!("   Index shards: {}", summary.shards);
                    println!("   Files written: {}", summary.files_written);
                    println!("✅ ETL run completed successfully");
                }
                Err(e) => {
                    error!("ETL run failed: {}", e);
                    eprintln!("❌ ETL run failed: {e}");
                    std::process::exit(1);
                }
            }
        }
    }
}
