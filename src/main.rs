//-
// Copyright (c) 2026, The Sealpost Authors
//
// This file is part of Sealpost.
//
// Sealpost is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free
// Software Foundation, either version 3 of the License, or (at your option)
// any later version.
//
// Sealpost is distributed in the hope that it will be useful, but WITHOUT ANY
// WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// Sealpost. If not, see <http://www.gnu.org/licenses/>.

#[cfg(test)]
macro_rules! assert_matches {
    ($expected:pat if $guard:expr, $actual:expr) => {
        match $actual {
            $expected if $guard => (),
            unexpected => panic!(
                "Expected {} matches {}, got {:?}",
                stringify!($expected if $guard),
                stringify!($actual),
                unexpected
            ),
        }
    };
    ($expected:pat, $actual:expr) => {
        match $actual {
            $expected => (),
            unexpected => panic!(
                "Expected {} matches {}, got {:?}",
                stringify!($expected),
                stringify!($actual),
                unexpected
            ),
        }
    };
}

mod account;
mod cli;
mod crypt;
mod ingest;
mod mime;
mod storage;
mod support;

fn main() {
    cli::main::main();
}

/// Log everything at `Info` and above to standard error.
fn init_simple_log() {
    init_stderr_log(log::LevelFilter::Info);
}

fn init_stderr_log(level: log::LevelFilter) {
    use log4rs::{
        append::console::{ConsoleAppender, Target},
        config::{Appender, Config, Root},
        encode::pattern::PatternEncoder,
    };

    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(
            "{d(%H:%M:%S%.3f)} [{l}][{t}] {m}{n}",
        )))
        .build();

    let config = Config::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr)))
        .build(Root::builder().appender("stderr").build(level));

    // Nothing useful can be done if this fails; the process just runs
    // without logging.
    if let Ok(config) = config {
        let _ = log4rs::init_config(config);
    }
}

#[cfg(test)]
static INIT_TEST_LOG: std::sync::Once = std::sync::Once::new();

#[cfg(test)]
fn init_test_log() {
    INIT_TEST_LOG.call_once(|| init_stderr_log(log::LevelFilter::Debug))
}
