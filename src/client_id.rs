//! Stable per-machine client id.
//!
//! The id is the BSD `sum` checksum of `/etc/machine-id`, printed as five
//! zero-padded digits, so it matches `sum /etc/machine-id | cut -f 1 -d ' '`.

use std::path::Path;

pub const MACHINE_ID_PATH: &str = "/etc/machine-id";

/// BSD 16-bit rotating checksum, as computed by `sum -r`.
pub fn bsd_checksum(bytes: &[u8]) -> u16 {
    bytes
        .iter()
        .fold(0u16, |sum, &b| sum.rotate_right(1).wrapping_add(u16::from(b)))
}

/// Client id derived from the contents of the file at `path`.
pub fn client_id_from(path: impl AsRef<Path>) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(format!("{:05}", bsd_checksum(&bytes)))
}

/// Client id of this machine.
pub fn client_id() -> std::io::Result<String> {
    client_id_from(MACHINE_ID_PATH)
}
