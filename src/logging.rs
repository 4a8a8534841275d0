use chrono::Local;
use log::LevelFilter;
use std::io::Write;

/// Timestamped logging to stderr. `RUST_LOG` still refines the filter.
pub fn init(debug: bool) {
    let level = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(level)
        .filter_module("hyper", LevelFilter::Info)
        .filter_module("rustls", LevelFilter::Info)
        .filter_module("reqwest", LevelFilter::Info)
        .parse_default_env()
        .target(env_logger::Target::Stderr)
        .format(|buf, record| {
            writeln!(
                buf,
                "{} {:<5} {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .init();
}
