use std::path::PathBuf;

use clap::Parser;
use knxroute_router::{Factories, Router, DEFAULT_MAIN_SECTION};
use knxroute_tools::load_config;

#[derive(Parser, Debug)]
#[command(name = "knxroute")]
struct Args {
    /// Router configuration file (TOML).
    #[arg(long, short)]
    config: PathBuf,
    /// Section holding the router settings.
    #[arg(long, default_value = DEFAULT_MAIN_SECTION)]
    main: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();
    let config = load_config(&args.config)?;

    let mut router = Router::new(config, Factories::builtin()).with_main(args.main);
    if let Err(e) = router.setup() {
        eprintln!("setup failed: {e}");
        std::process::exit(router.exitcode().max(1));
    }

    let handle = router.handle();
    let mut reactor = tokio::spawn(router.run());
    handle.start();

    let code = tokio::select! {
        code = &mut reactor => code?,
        signal = tokio::signal::ctrl_c() => {
            signal?;
            log::info!("interrupted, shutting down");
            handle.stop(false);
            reactor.await?
        }
    };
    std::process::exit(code);
}
