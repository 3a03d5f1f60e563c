use clap::Parser;
use knxroute_tools::{AddressKind, ParsedAddress};

#[derive(Parser, Debug)]
#[command(name = "knxroute-readaddr")]
struct Args {
    /// Notation of the addresses given.
    #[arg(long, value_enum, default_value_t = AddressKind::Individual)]
    kind: AddressKind,
    #[arg(long)]
    json: bool,
    #[arg(required = true)]
    addresses: Vec<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let mut parsed = Vec::with_capacity(args.addresses.len());
    let mut failed = false;
    for text in &args.addresses {
        match ParsedAddress::parse(args.kind, text) {
            Ok(address) => parsed.push(address),
            Err(e) => {
                eprintln!("{text}: {e}");
                failed = true;
            }
        }
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&parsed)?);
    } else {
        for address in &parsed {
            println!("{address}");
        }
    }

    if failed {
        std::process::exit(1);
    }
    Ok(())
}
