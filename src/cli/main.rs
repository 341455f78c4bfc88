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

use std::fs;
use std::io::Read;
use std::mem;
use std::path::{Path, PathBuf};

use structopt::StructOpt;

use crate::support::diagnostic;
use crate::support::sysexits::*;
use crate::support::system_config::SystemConfig;

#[derive(StructOpt)]
#[structopt(max_term_width = 80)]
enum Command {
    /// Commands to be run on the mail server.
    Server(ServerSubcommand),
}

#[derive(StructOpt, Default)]
pub(super) struct ServerCommonOptions {
    /// The directory containing `sealpost.toml` etc
    /// [default: /etc/sealpost or /usr/local/etc/sealpost]
    #[structopt(long, parse(from_os_str))]
    root: Option<PathBuf>,
}

#[derive(StructOpt)]
enum ServerSubcommand {
    Deliver(ServerDeliverSubcommand),
    Decrypt(ServerDecryptSubcommand),
}

impl ServerSubcommand {
    fn common_options(&mut self) -> ServerCommonOptions {
        match *self {
            ServerSubcommand::Deliver(ref mut c) => mem::take(&mut c.common),
            ServerSubcommand::Decrypt(ref mut c) => mem::take(&mut c.common),
        }
    }
}

/// Deliver one message from standard input.
///
/// This is intended to be run by the MTA as the local delivery agent, once
/// per message. The message is stored in the INBOX of the account owning the
/// first recipient (To, then Cc, then Bcc) that is either an account's
/// primary address or, failing that, the target of an active alias. The
/// subject and body are encrypted for that account before being stored.
///
/// The exit status follows the sysexits.h conventions: 0 if the message was
/// stored, EX_NOUSER if nobody owns any recipient, EX_DATAERR if the input is
/// not a message or was already delivered, and EX_TEMPFAIL if the database
/// could not be used, in which case the MTA should try again later.
#[derive(StructOpt)]
pub(super) struct ServerDeliverSubcommand {
    #[structopt(flatten)]
    pub(super) common: ServerCommonOptions,
}

/// Decrypt stored subject or body values.
///
/// Each value is printed on its own line, prefixed with "decrypted:" if it
/// was encrypted for the given account, "plaintext:" if it was stored before
/// encryption was introduced, or "failed" if it looks encrypted but cannot be
/// decrypted (usually due to a different secret or account).
///
/// If no values are given, they are read from standard input, one per line.
#[derive(StructOpt)]
pub(super) struct ServerDecryptSubcommand {
    #[structopt(flatten)]
    pub(super) common: ServerCommonOptions,

    /// The ID of the account the values belong to.
    #[structopt(long)]
    pub(super) account: i64,

    /// Print only the text the webmail would display, without the prefix.
    /// Values which cannot be decrypted are printed as-is.
    #[structopt(long)]
    pub(super) text_only: bool,

    /// The values to decrypt.
    pub(super) values: Vec<String>,
}

pub fn main() {
    // Clap exits with status 1 instead of EX_USAGE if we use the more concise
    // API
    let cmd = Command::from_clap(&match Command::clap().get_matches_safe() {
        Ok(matches) => matches,
        Err(
            e @ clap::Error {
                kind: clap::ErrorKind::HelpDisplayed,
                ..
            },
        )
        | Err(
            e @ clap::Error {
                kind: clap::ErrorKind::VersionDisplayed,
                ..
            },
        ) => {
            println!("{}", e.message);
            return;
        },
        Err(e) => {
            eprintln!("{}", e.message);
            EX_USAGE.exit()
        },
    });

    match cmd {
        Command::Server(cmd) => server(cmd),
    }
}

fn server(mut cmd: ServerSubcommand) {
    let common = cmd.common_options();
    let root = common.root.unwrap_or_else(|| {
        if Path::new("/etc/sealpost/sealpost.toml").is_file() {
            "/etc/sealpost".to_owned().into()
        } else if Path::new("/usr/local/etc/sealpost/sealpost.toml").is_file()
        {
            "/usr/local/etc/sealpost".to_owned().into()
        } else {
            eprintln!(
                "Neither /etc/sealpost nor /usr/local/etc/sealpost looks like\n\
                 the Sealpost root; use --root=/path/to/sealpost if your\n\
                 installation is elsewhere."
            );
            EX_CONFIG.exit()
        }
    });

    let system_config = match load_system_config(&root) {
        Ok(config) => config,
        Err(exit) => exit.exit(),
    };

    if let ServerSubcommand::Deliver(..) = cmd {
        if let Err(exit) =
            diagnostic::apply_diagnostics(&root, &system_config.diagnostic)
        {
            exit.exit();
        }
    }

    init_logging(&root);

    let db_path = root.join(&system_config.database.path);
    match cmd {
        ServerSubcommand::Deliver(_) => {
            super::deliver::deliver(system_config, db_path);
        },
        ServerSubcommand::Decrypt(cmd) => {
            super::decrypt::decrypt(system_config, cmd);
        },
    }
}

fn load_system_config(root: &Path) -> Result<SystemConfig, Sysexit> {
    let system_config_path = root.join("sealpost.toml");
    let mut system_config_toml = Vec::new();
    if let Err(e) = fs::File::open(&system_config_path)
        .and_then(|mut f| f.read_to_end(&mut system_config_toml))
    {
        eprintln!("Error reading '{}': {}", system_config_path.display(), e);
        return Err(EX_CONFIG);
    }

    let system_config: SystemConfig =
        match toml::from_slice(&system_config_toml) {
            Ok(config) => config,
            Err(e) => {
                eprintln!(
                    "Error in config file at '{}': {}",
                    system_config_path.display(),
                    e
                );
                return Err(EX_CONFIG);
            },
        };

    if system_config.encryption.secret.is_empty() {
        eprintln!(
            "'{}' does not set encryption.secret",
            system_config_path.display()
        );
        return Err(EX_CONFIG);
    }

    Ok(system_config)
}

fn init_logging(root: &Path) {
    if Ok(true) == nix::unistd::isatty(2) {
        // Running interactively; ignore logging configuration and just write
        // to stderr.
        crate::init_simple_log();
        return;
    }

    let log_config_file = root.join("logging.toml");
    if log_config_file.is_file() {
        if let Err(e) = log4rs::init_file(
            &log_config_file,
            log4rs::file::Deserializers::new(),
        ) {
            eprintln!(
                "Failed to load '{}', logging to stderr: {}",
                log_config_file.display(),
                e
            );
            crate::init_simple_log();
        }
        return;
    }

    let formatter = syslog::Formatter3164 {
        facility: syslog::Facility::LOG_MAIL,
        hostname: None,
        process: env!("CARGO_PKG_NAME").to_owned(),
        pid: nix::unistd::getpid().as_raw(),
    };

    match syslog::unix(formatter) {
        Ok(logger) => {
            if log::set_boxed_logger(Box::new(syslog::BasicLogger::new(logger)))
                .is_ok()
            {
                log::set_max_level(log::LevelFilter::Info);
            }
        },
        Err(e) => {
            eprintln!("Failed to connect to syslog, logging to stderr: {}", e);
            crate::init_simple_log();
        },
    }
}
