use chrono::Local;
use env_logger::Builder;
use log::LevelFilter;
use std::io::Write;

/// Environment variable holding an env_logger filter, e.g. `debug` or
/// `pricing_assistant_lib::relevance=debug`.
pub const LOG_ENV: &str = "PRICING_LOG";

pub fn init() {
    let mut builder = Builder::new();
    builder
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {} - {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .filter(None, LevelFilter::Info);

    if let Ok(filters) = std::env::var(LOG_ENV) {
        builder.parse_filters(&filters);
    }
    builder.init();

    log::debug!("Logger initialized.");
}
