use serde::Serialize;
use crate::config::settings::Logger;

#[derive(Serialize)]
pub struct LoggerExtraFields {
    pub request_id: String,
}

/// Clears the ECS extra fields when dropped.
pub struct LoggerExtraFieldsGuard;

impl Drop for LoggerExtraFieldsGuard {
    fn drop(&mut self) {
        ecs_logger::extra_fields::clear_extra_fields();
    }
}

/// Attaches `request_id` to subsequent log lines until the returned guard is
/// dropped. The fields are thread-local while handlers may resume on another
/// worker after an `.await`, so under concurrent load a line can carry another
/// request's id or none at all.
pub fn set_request_fields(request_id: &str) -> LoggerExtraFieldsGuard {
    if let Err(e) = ecs_logger::extra_fields::set_extra_fields(LoggerExtraFields {
        request_id: request_id.to_string(),
    }) {
        log::warn!("failed to set logger extra fields: {e}");
    }
    LoggerExtraFieldsGuard
}

pub fn parse_level(level: &str) -> log::LevelFilter {
    match level.to_ascii_lowercase().as_str() {
        "trace" => log::LevelFilter::Trace,
        "debug" => log::LevelFilter::Debug,
        "warn" => log::LevelFilter::Warn,
        "error" => log::LevelFilter::Error,
        "off" => log::LevelFilter::Off,
        _ => log::LevelFilter::Info,
    }
}

pub fn setup_logger(logger: Option<&Logger>) {
    let log_level = logger
        .map(|l| parse_level(&l.level))
        .unwrap_or(log::LevelFilter::Info);

    // try_init: tests may set up the logger more than once.
    let _ = env_logger::builder()
        .filter_level(log_level)
        .format(ecs_logger::format)
        .target(env_logger::Target::Stdout)
        .try_init();
}
