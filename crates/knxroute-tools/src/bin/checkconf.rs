use std::path::PathBuf;

use clap::Parser;
use knxroute_router::DEFAULT_MAIN_SECTION;
use knxroute_tools::{check_config, load_config};

#[derive(Parser, Debug)]
#[command(name = "knxroute-checkconf")]
struct Args {
    /// Router configuration file (TOML).
    #[arg(long, short)]
    config: PathBuf,
    /// Section holding the router settings.
    #[arg(long, default_value = DEFAULT_MAIN_SECTION)]
    main: String,
    #[arg(long)]
    json: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();
    let config = load_config(&args.config)?;
    let report = check_config(config, &args.main);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for check in std::iter::once(&report.setup).chain(&report.links) {
            match &check.error {
                None => println!("[{}] ok", check.section),
                Some(err) => println!("[{}] FAILED: {err}", check.section),
            }
        }
    }

    if !report.ok() {
        std::process::exit(1);
    }
    Ok(())
}
