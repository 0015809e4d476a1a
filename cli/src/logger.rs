/// Set up log levels, formatting, and other configurations for the logger
pub(crate) struct Logger;

impl Logger {
    pub(crate) fn init() {
        let logger = env_logger::Builder::from_env(
            // No logs shown by default, only human-friendly messages
            // Enable logs output with "export RUST_LOG=debug" in terminal
            env_logger::Env::default().default_filter_or("off"),
        )
        .try_init();

        if let Err(error) = logger {
            eprintln!("Failed to set up logger: {error}");
        }
    }
}
