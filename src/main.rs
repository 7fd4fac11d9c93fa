use clap::Parser;
use log::debug;
use snafu::ErrorCompat;

mod app;
mod args;

fn main() {
    let args = args::Args::parse();
    let filter = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();
    debug!("arguments: {:?}", args);

    if let Err(e) = app::run(&args) {
        eprintln!("Erreur : {}", e);
        if let Some(bt) = ErrorCompat::backtrace(&e) {
            debug!("trace: {}", bt);
        }
        std::process::exit(1);
    }
}
