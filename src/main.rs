use std::env;
use std::process::exit;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{error, info};

use rproxy::backend::Pool;
use rproxy::cli;
use rproxy::dispatcher::Dispatcher;
use rproxy::listener::Listener;

#[tokio::main]
pub async fn main() {
    let args: Vec<String> = env::args().collect();
    let (config, log_level) = match cli::parse(&args) {
        Ok(parsed) => parsed,
        Err(cli::CliError::Help) => {
            println!("{}", cli::usage());
            exit(0);
        }
        Err(e) => {
            eprintln!("{}", e);
            exit(1);
        }
    };

    if let Some(level) = log_level {
        env::set_var("RUST_LOG", level);
    }
    rproxy::init_logging().expect("can't enable logging");

    let pool = Arc::new(Pool::new());
    for backend in &config.backends {
        pool.add(backend.host.clone(), backend.port, backend.weight, None).await;
    }

    let listener = match Listener::bind(config.port, config.connections_accepted) {
        Ok(listener) => listener,
        Err(e) => {
            error!("{}", e);
            exit(1);
        }
    };
    info!(
        "listening on port {} with {} backend(s), strategy {:?}",
        config.port,
        config.backends.len(),
        config.strategy
    );

    // Global shutdown flag: the signal handler only performs the atomic
    // store, the dispatcher reads it at the top of each tick (§6, design
    // note "Global shutdown flag").
    let quit = Arc::new(AtomicBool::new(false));
    let signal_quit = quit.clone();
    tokio::spawn(async move {
        loop {
            if tokio::signal::ctrl_c().await.is_err() {
                break;
            }
            if signal_quit.swap(true, Ordering::SeqCst) {
                info!("second SIGINT received, forcing immediate exit");
                exit(1);
            }
            info!("SIGINT received, shutting down gracefully");
        }
    });

    let mut dispatcher = Dispatcher::new(
        listener,
        pool,
        config.strategy,
        config.retries,
        config.stale_timeout,
        quit,
    );
    dispatcher.run().await;
    exit(0);
}
