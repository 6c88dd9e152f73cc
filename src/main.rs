mod cache;
mod cli;
mod client;
mod error;
mod history;
mod logging;
mod model;
mod orchestrator;
mod params;
mod status;
mod text_summary;
#[cfg(feature = "tui")]
mod tui;

use clap::Parser;

fn main() {
    let args = cli::Cli::parse();
    let interactive = cli::is_interactive(&args);

    if let Err(e) = logging::init(args.log_file.as_deref(), interactive) {
        eprintln!("warning: logging disabled: {e:#}");
    }

    // The local offset can only be read while the process is single-threaded.
    let utc_offset = status::local_offset();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to start async runtime: {e}");
            std::process::exit(1);
        }
    };

    match runtime.block_on(cli::run(args, utc_offset)) {
        Ok(()) => {
            // Explicitly exit with code 0 on success, especially for non-TUI modes
            if !interactive {
                std::process::exit(0);
            }
        }
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "command failed");
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    }
}
