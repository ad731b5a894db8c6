// TDB - TinyVM Debugger
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Logging configuration for TDB components
//!
//! Provides centralized logging setup with:
//! - Structured console output
//! - Optional file logging to a temporary directory with daily rotation
//! - Environment variable support (RUST_LOG)
//! - Default INFO level

use eyre::Result;
use std::{env, fs, path::PathBuf, sync::Once};
use tracing::Level;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static TEST_LOGGING_INIT: Once = Once::new();

/// Initialize logging for a TDB component.
///
/// Sets up a console layer (with ANSI colors) and, when
/// `enable_file_logging` is set, a daily-rotated file layer under the
/// system temporary directory. Log levels come from `RUST_LOG` with a
/// default of `info`.
pub fn init_logging(component_name: &str, enable_file_logging: bool) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;

    let console_layer = fmt::layer().with_target(true).with_ansi(true);

    if enable_file_logging {
        let log_dir = create_log_directory(component_name)?;
        let file_appender = rolling::daily(&log_dir, format!("{component_name}.log"));
        let (non_blocking_appender, guard) = non_blocking(file_appender);
        // The guard flushes the writer on drop; the subscriber lives for
        // the rest of the process, so leak it.
        std::mem::forget(guard);

        let file_layer = fmt::layer()
            .with_target(true)
            .with_ansi(false)
            .with_writer(non_blocking_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer)
            .try_init()
            .map_err(|e| eyre::eyre!("failed to initialize tracing subscriber: {e}"))?;

        tracing::info!(
            component = component_name,
            log_dir = %log_dir.display(),
            "Logging initialized with console and file output"
        );
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .try_init()
            .map_err(|e| eyre::eyre!("failed to initialize tracing subscriber: {e}"))?;

        tracing::info!(component = component_name, "Logging initialized with console output only");
    }

    Ok(())
}

/// Initialize minimal console-only logging with the given default
/// level. `RUST_LOG` still takes precedence when set.
pub fn init_simple_logging(default_level: Level) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level.to_string().to_lowercase()))?;

    let console_layer = fmt::layer().with_target(true).with_ansi(true).compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .try_init()
        .map_err(|e| eyre::eyre!("failed to initialize tracing subscriber: {e}"))?;

    Ok(())
}

/// Idempotently set up console logging for tests. Initialization errors
/// are ignored; they usually mean another subscriber is already
/// installed, which is fine for tests.
pub fn ensure_test_logging(default_level: Option<Level>) {
    TEST_LOGGING_INIT.call_once(|| {
        let default_level = default_level.unwrap_or(Level::INFO);
        let _ = init_simple_logging(default_level);
    });
}

fn create_log_directory(component_name: &str) -> Result<PathBuf> {
    let log_dir = env::temp_dir().join("tdb").join("logs").join(component_name);
    fs::create_dir_all(&log_dir)?;
    Ok(log_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::{debug, info, warn};

    #[test]
    fn test_logging_functions_work() {
        ensure_test_logging(None);
        info!("Test info message");
        warn!("Test warning message");
        debug!("Test debug message");
    }

    #[test]
    fn test_repeated_init_is_harmless() {
        ensure_test_logging(None);
        ensure_test_logging(Some(Level::DEBUG));
    }

    #[test]
    fn test_log_directory_is_created() {
        let dir = create_log_directory("tdb-test").unwrap();
        assert!(dir.exists());
    }
}
