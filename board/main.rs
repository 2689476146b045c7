/// ferrite-captcha board
///
/// Read-only viewer for a run directory written by `captcha-train`: latest
/// scalar values, the raw scalar log as JSON and the saved prediction figures.
/// Served by a synchronous tiny_http server.
///
/// Run with:
///   cargo run --bin board -- --run-dir runs/captcha
/// Then open http://127.0.0.1:7879

mod render;
mod routes;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tiny_http::Server;

/// Serve a captcha training run directory over HTTP
#[derive(Parser, Debug)]
#[command(name = "board")]
struct Args {
    /// Run directory containing scalars.jsonl and figures/
    #[arg(short, long, default_value = "runs/captcha")]
    run_dir: PathBuf,

    #[arg(short, long, default_value = "127.0.0.1:7879")]
    addr: String,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let server = match Server::http(&args.addr) {
        Ok(server) => server,
        Err(e) => {
            log::error!("Failed to bind {}: {e}", args.addr);
            return ExitCode::FAILURE;
        }
    };
    log::info!("Serving {} on http://{}", args.run_dir.display(), args.addr);

    let run_dir = Arc::new(args.run_dir);
    // One thread per request so a slow figure download does not stall the page.
    for request in server.incoming_requests() {
        let run_dir = Arc::clone(&run_dir);
        std::thread::spawn(move || routes::dispatch(request, &run_dir));
    }
    ExitCode::SUCCESS
}
