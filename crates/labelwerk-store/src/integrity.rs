// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Template body fingerprints.
//
// Every stored template body carries its SHA-256 digest. Bodies are checked
// against it on load, so a row edited behind our back is never sent to a
// printer.

use labelwerk_core::error::{LabelwerkError, Result};
use sha2::{Digest, Sha256};

/// SHA-256 of `data` as lowercase hex.
pub fn hash_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Check `data` against a stored hex digest.
pub fn verify_hash(data: &[u8], expected_hex: &str) -> Result<()> {
    let actual = hash_bytes(data);
    if actual == expected_hex {
        Ok(())
    } else {
        Err(LabelwerkError::IntegrityMismatch {
            expected: expected_hex.to_owned(),
            actual,
        })
    }
}
