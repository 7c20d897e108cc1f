use clap::Parser;
use mneme::cli::{self, Cli};

fn main() {
    let cli = Cli::parse();
    let code = cli::map_exit_code(cli::run(cli));
    std::process::exit(code);
}
