use std::env;

use learn_sync::cli::{self, Command};

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = env::args().skip(1).collect();
    let parsed = match cli::parse_args(&args) {
        Ok(parsed) => parsed,
        Err(message) => {
            eprintln!("Error: {message}");
            eprintln!();
            cli::print_usage();
            std::process::exit(2);
        }
    };

    if parsed.command == Command::Help {
        cli::print_usage();
        return;
    }

    if let Err(e) = cli::run(parsed).await {
        eprintln!("Error: {}", learn_sync::error_trace(&e));
        std::process::exit(1);
    }
}
