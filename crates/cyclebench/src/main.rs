//! cyclebench - cycle-based load generator
//!
//! Runs one workload through a list of concurrency levels, counting
//! outcomes inside each cycle's recording window, and writes an XML run log
//! with the samples of any configured monitoring agents.

mod cli;
mod output;
mod workloads;

use std::future::Future;
use std::io::ErrorKind;
use std::thread;

use clap::Parser;
use libcyclebench_core::{
    AbortHandle, BenchConfig, BenchError, BenchReport, CycleScheduler, ResultLogger, SuiteFile,
    WorkloadName,
};
use libcyclebench_monitor::MonitorClient;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cli::Cli;

/// Exit code of a run cut short by an interrupt
const EXIT_INTERRUPTED: i32 = 130;

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let code = match run(&cli) {
        Ok(report) if report.interrupted => EXIT_INTERRUPTED,
        Ok(report) => report.exit_code(),
        Err(e) => {
            output::output_error(&e);
            e.exit_code()
        }
    };
    std::process::exit(code);
}

fn run(cli: &Cli) -> Result<BenchReport, BenchError> {
    let name = WorkloadName::parse(&cli.workload)?;
    let factory = workloads::builtin_registry()?.resolve(&name)?;

    let suite = SuiteFile::load(&cli.config).map_err(|e| match e {
        BenchError::Io(ref io) if io.kind() == ErrorKind::NotFound => BenchError::InvalidConfig(
            format!("configuration file not found: {}", cli.config.display()),
        ),
        other => other,
    })?;
    let mut config = BenchConfig::from_suite(&suite, &name.method, Some(&cli.config))?;
    config.apply(cli.overrides())?;

    output::print_banner(&config, &cli.workload);

    let monitors = MonitorClient::connect(config.monitors.clone(), config.monitor_timeout);
    let logger = ResultLogger::create(&config.log_xml)?;
    let log_path = config.log_xml.clone();

    let mut scheduler = CycleScheduler::new(config, factory, monitors, logger);
    spawn_signal_listener(scheduler.abort_handle());

    let report = scheduler.run()?;
    output::print_summary(cli, &report);
    info!(path = %log_path.display(), "Run log written");

    if let Some(ref path) = cli.json_report {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json)?;
        println!("Report saved to {}", path.display());
    }

    Ok(report)
}

/// Trigger `abort` on Ctrl+C or SIGTERM; a second one exits at once
fn spawn_signal_listener(abort: AbortHandle) {
    let spawned = thread::Builder::new()
        .name("signals".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    warn!("Cannot start signal runtime: {}", e);
                    return;
                }
            };

            runtime.block_on(handle_interrupts(
                next_interrupt(),
                next_interrupt(),
                &abort,
                || std::process::exit(EXIT_INTERRUPTED),
            ));
        });

    if let Err(e) = spawned {
        warn!("Cannot install interrupt handler: {}", e);
    }
}

/// First interrupt aborts the run gracefully, the next one calls `force_exit`
async fn handle_interrupts<F, S, E>(first: F, second: S, abort: &AbortHandle, force_exit: E)
where
    F: Future<Output = ()>,
    S: Future<Output = ()>,
    E: FnOnce(),
{
    first.await;
    warn!("Interrupt received, stopping after the current cycle (interrupt again to exit)");
    abort.abort();

    second.await;
    warn!("Second interrupt, exiting immediately");
    force_exit();
}

/// Resolve on the next Ctrl+C or SIGTERM
async fn next_interrupt() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
