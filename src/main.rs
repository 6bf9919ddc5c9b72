// src/main.rs

use scriptcast::{cli, logging, run};

#[tokio::main]
async fn main() {
    match run_main().await {
        Ok(code) => std::process::exit(process_exit_code(code)),
        Err(err) => {
            eprintln!("scriptcast error: {err:?}");
            std::process::exit(1);
        }
    }
}

async fn run_main() -> anyhow::Result<i32> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    run(args).await
}

/// Signal deaths (reported as `-signal`) map to the shell's `128 + signal`.
fn process_exit_code(code: i32) -> i32 {
    if code < 0 { 128 - code } else { code }
}
