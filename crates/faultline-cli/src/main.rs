#![allow(missing_docs)]
#![allow(clippy::print_stderr)]

use faultline_cli::CliOpts;

use tracing_subscriber::EnvFilter;

fn main() {
    let cli = CliOpts::parse_from_cmdline();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_env_var("FAULTLINE_LOG")
                .from_env_lossy(),
        )
        .init();

    if let Err(e) = faultline_cli::evaluate_run(cli) {
        eprintln!("{e:?}");
        std::process::exit(1);
    }
}
