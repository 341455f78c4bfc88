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

use std::path::Path;

use log::error;

use super::sysexits::*;
use super::system_config::DiagnosticConfig;

/// Apply the diagnostic configuration.
///
/// On failure, an error message has already been logged, and the appropriate
/// exit code is returned.
pub fn apply_diagnostics(
    root: &Path,
    config: &DiagnosticConfig,
) -> Result<(), Sysexit> {
    if let Some(ref stderr_path) = config.stderr {
        redirect_stderr(&root.join(stderr_path))?;
    }

    Ok(())
}

fn redirect_stderr(stderr_path: &Path) -> Result<(), Sysexit> {
    let fd = match nix::fcntl::open(
        stderr_path,
        nix::fcntl::OFlag::O_APPEND
            | nix::fcntl::OFlag::O_WRONLY
            | nix::fcntl::OFlag::O_CREAT,
        nix::sys::stat::Mode::from_bits_truncate(0o640),
    ) {
        Ok(fd) => fd,
        Err(e) => {
            error!(
                "failed to redirect stderr: open({}): {:?}",
                stderr_path.display(),
                e,
            );
            return Err(EX_CANTCREAT);
        },
    };

    let result = nix::unistd::dup2(fd, 2);
    let _ = nix::unistd::close(fd);
    if let Err(e) = result {
        error!("failed to redirect stderr: dup2: {:?}", e);
        return Err(EX_OSERR);
    }

    Ok(())
}
