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

//! At-rest encryption of message content.
//!
//! Everything here must stay bit-compatible with the webmail front end, which
//! decrypts what we store. See `content_cipher` for the format.

mod content_cipher;

pub use content_cipher::{ContentCipher, Decryption};

/// The AES block size, and thus the IV length.
pub const AES_BLOCK: usize = 16;
