use clap::Parser;
use subrecon_cli::{execute, Args};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if let Err(e) = execute(&args, &mut out) {
        eprintln!("ERROR: {:#}", e);
        std::process::exit(1);
    }
}
