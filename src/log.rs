use env_logger::Builder;
use log::LevelFilter;
use std::io::Write;
use std::time::Instant;

/// Installs a logger printing the time elapsed since start-up in front of
/// every record.
pub fn build_logger_for_level(level: LevelFilter) {
    let start_time = Instant::now();

    let mut builder = Builder::from_default_env();
    builder
        .format(move |buf, record| {
            let elapsed = start_time.elapsed().as_millis();
            writeln!(
                buf,
                "{:>6}.{:<03} [{}] - {}",
                elapsed / 1000,
                elapsed % 1000,
                record.level(),
                record.args()
            )
        })
        .filter(None, level)
        .init();
}

/// Maps `-v` occurrences on top of a default level; each occurrence makes the
/// output one step noisier.
pub fn build_logger_for_verbosity(default_level: LevelFilter, verbosity: usize) {
    build_logger_for_level(level_from_verbosity(default_level, verbosity));
}

fn level_from_verbosity(default_level: LevelFilter, verbosity: usize) -> LevelFilter {
    let levels = [
        LevelFilter::Off,
        LevelFilter::Error,
        LevelFilter::Warn,
        LevelFilter::Info,
        LevelFilter::Debug,
        LevelFilter::Trace,
    ];
    let base = levels
        .iter()
        .position(|&l| l == default_level)
        .unwrap_or(0);
    levels[(base + verbosity).min(levels.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_raises_the_level_and_saturates() {
        assert_eq!(
            level_from_verbosity(LevelFilter::Warn, 0),
            LevelFilter::Warn
        );
        assert_eq!(
            level_from_verbosity(LevelFilter::Warn, 1),
            LevelFilter::Info
        );
        assert_eq!(
            level_from_verbosity(LevelFilter::Warn, 3),
            LevelFilter::Trace
        );
        assert_eq!(
            level_from_verbosity(LevelFilter::Off, 99),
            LevelFilter::Trace
        );
    }
}
