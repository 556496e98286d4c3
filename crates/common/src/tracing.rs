// Copyright (C) 2025 Ryan Daum <ryan.daum@gmail.com> This program is free
// software: you can redistribute it and/or modify it under the terms of the GNU
// General Public License as published by the Free Software Foundation, version
// 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Shared tracing initialization for protocosm binaries

use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

/// Initialize tracing, honouring `RUST_LOG` when it is set.
///
/// Without `RUST_LOG`, logs at DEBUG if `debug_fallback` is set and INFO otherwise.
pub fn init_tracing(debug_fallback: bool) -> Result<(), eyre::Report> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(env_filter) => env_filter,
        Err(_) => {
            let level = if debug_fallback { "debug" } else { "info" };
            // fjall is chatty at debug.
            EnvFilter::try_new(format!("{level},fjall=warn,lsm_tree=warn"))?
        }
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .compact()
                .with_ansi(true)
                .with_file(true)
                .with_target(false)
                .with_line_number(true)
                .with_thread_names(true)
                .with_span_events(fmt::format::FmtSpan::NONE),
        )
        .with(filter)
        .try_init()?;

    Ok(())
}
