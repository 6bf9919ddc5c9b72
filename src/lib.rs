// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod process;
pub mod service;
pub mod stream;
pub mod types;

use std::io::Write;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::{ScriptConfig, resolve_values};
use crate::exec::ScriptExecutor;
use crate::service::ExecutionService;
use crate::stream::publisher::lock;
use crate::types::{ExecutionId, ParameterValues, User};

/// High-level entry point used by `main.rs`. Returns the script's exit code.
///
/// This wires together:
/// - config loading and parameter values
/// - the execution service
/// - output printing
/// - Ctrl-C handling (first press stops, second kills)
pub async fn run(args: CliArgs) -> Result<i32> {
    let config = load_and_validate(&args.config)
        .with_context(|| format!("loading script definition {}", args.config.display()))?;
    let config = if args.pty {
        config.with_requires_terminal(true)
    } else {
        config
    };
    let config = Arc::new(config);
    let values = resolve_values(&config, &args.params)?;

    if args.dry_run {
        print_dry_run(&config, &values)?;
        return Ok(0);
    }

    let user = User::local(args.user.clone().unwrap_or_else(default_user_id));
    let service = Arc::new(ExecutionService::default());

    let execution_id = service.start_script(Arc::clone(&config), values, user.clone())?;

    let (done_tx, done_rx) = oneshot::channel::<ExecutionId>();
    let done_tx = Mutex::new(Some(done_tx));
    service.add_finish_listener(
        Arc::new(move |id: ExecutionId, _user: &User| {
            if let Some(tx) = lock(&done_tx).take() {
                let _ = tx.send(id);
            }
            Ok(())
        }),
        Some(execution_id),
    )?;

    let output = service.get_anonymized_output_stream(execution_id, &user)?;
    output.subscribe_fn(
        |chunk: &String| {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(chunk.as_bytes())?;
            stdout.flush()?;
            Ok(())
        },
        || Ok(()),
    );

    let ctrl_c = {
        let service = Arc::clone(&service);
        let user = user.clone();
        tokio::spawn(async move {
            let mut presses = 0u32;
            loop {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!(error = %e, "failed to listen for Ctrl+C");
                    return;
                }
                presses += 1;
                let result = if presses == 1 {
                    info!(execution_id, "stopping script; press Ctrl+C again to kill it");
                    service.stop_script(execution_id, &user)
                } else {
                    service.kill_script(execution_id, &user)
                };
                if let Err(e) = result {
                    warn!(execution_id, error = %e, "failed to interrupt script");
                }
            }
        })
    };

    done_rx
        .await
        .context("finish notification was dropped")?;
    ctrl_c.abort();

    // Everything printed before we report back.
    tokio::task::spawn_blocking(move || output.wait_close(None)).await??;

    let exit_code = service
        .get_exit_code(execution_id, &user)?
        .unwrap_or(-1);
    service.cleanup_execution(execution_id, &user)?;

    info!(execution_id, exit_code, "script finished");
    Ok(exit_code)
}

fn default_user_id() -> String {
    std::env::var("USER")
        .ok()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "local".to_string())
}

/// Print what would run, secrets masked.
fn print_dry_run(config: &Arc<ScriptConfig>, values: &ParameterValues) -> Result<()> {
    let executor = ScriptExecutor::new(Arc::clone(config), values.clone());
    let command = executor.secure_command()?;

    println!("scriptcast dry-run");
    println!("  script: {}", config.name());
    println!("  command: {command}");
    if let Some(dir) = config.working_directory() {
        println!("  working_directory: {}", dir.display());
    }
    println!("  terminal: {}", config.requires_terminal());
    println!();

    println!("parameters ({}):", config.parameters().len());
    for parameter in config.parameters().iter() {
        let shown = match values.get(&parameter.name) {
            None => "<unset>".to_string(),
            Some(_) if parameter.secure => exec::SECURE_MASK.to_string(),
            Some(value) => value.to_plain_string(),
        };
        println!("  - {} = {shown}", parameter.name);
        println!("      pass_as: {:?}", parameter.pass_as);
        if let Some(ref expected) = parameter.stdin_expected_text {
            println!("      stdin_expected_text: {expected}");
        }
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}
