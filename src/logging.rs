//! Console logging for the command-line tools.
//!
//! Library code only emits records through `log`; installing a logger is
//! left to binaries.

use std::io::Write;

use env_logger::{Builder, Env};
use log::LevelFilter;

/// Install a coloured `LEVEL target: message` logger on stderr.
///
/// `RUST_LOG` takes precedence; otherwise `info`, or `debug` with `verbose`.
pub fn init(verbose: bool) {
    let env = Env::default().default_filter_or(default_level(verbose).as_str());
    if let Err(err) = builder(env).try_init() {
        log::debug!("Logger already installed: {err}");
    }
}

fn builder(env: Env<'_>) -> Builder {
    let mut builder = Builder::from_env(env);
    builder.format(|buf, record| {
        let style = buf.default_level_style(record.level());
        writeln!(
            buf,
            "{style}{:<8}{style:#} {}: {}",
            record.level(),
            record.target(),
            record.args()
        )
    });
    builder
}

/// Level implied by the `verbose` flag, used when `RUST_LOG` is unset.
pub fn default_level(verbose: bool) -> LevelFilter {
    if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}
