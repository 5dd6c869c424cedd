pub mod backend;
pub mod cli;
pub mod codec;
pub mod config;
pub mod dispatcher;
pub mod health;
pub mod listener;
pub mod selector;
pub mod transaction;
pub mod upstream;

/// Convenience alias for the top-level plumbing: CLI parsing, socket bind,
/// runtime bootstrap. Components below that layer return their own typed
/// errors instead.
pub type AsyncResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Initializes the `log` facade with `env_logger`, honoring `RUST_LOG` and
/// falling back to `info` for this crate's own target.
pub fn init_logging() -> AsyncResult<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).try_init()?;
    Ok(())
}
