//! Config handling

use tracing::log::LevelFilter;

/// Dependency modules that are far too chatty below `Info` unless we're debugging.
const QUIET_MODULES: &[(&str, LevelFilter)] = &[
    ("tracing", LevelFilter::Warn),
    ("reqwest", LevelFilter::Info),
    ("rustls", LevelFilter::Info),
    ("hyper_util", LevelFilter::Info),
    ("tower_sessions", LevelFilter::Warn),
    ("tower_sessions_core", LevelFilter::Warn),
];

/// Sets up logging based on the debug flag
pub fn setup_logging(debug: bool) -> Result<(), Box<std::io::Error>> {
    let level = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let mut logger = simple_logger::SimpleLogger::new().with_level(level);
    if !debug {
        for (module, level) in QUIET_MODULES {
            logger = logger.with_module_level(module, *level);
        }
    }
    logger.init().map_err(|err| {
        eprintln!("Failed to initialize logger: {}", err);
        Box::new(std::io::Error::other(err))
    })
}
