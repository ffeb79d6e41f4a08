// ABOUTME: Streaming SHA-256 fingerprints for files and short stable keys.
// ABOUTME: Files are hashed in fixed-size chunks, never loaded whole.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Read size used when hashing archive files.
pub const HASH_CHUNK_SIZE: usize = 64 * 1024;

/// Length of the hex prefix used as a store key.
const KEY_LEN: usize = 16;

/// Hex SHA-256 of a file's full content.
pub fn file_sha256(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; HASH_CHUNK_SIZE];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// [`file_sha256`] on the blocking pool, so large archives do not stall
/// the async runtime.
pub async fn file_sha256_blocking(path: &Path) -> io::Result<String> {
    let path = path.to_owned();
    tokio::task::spawn_blocking(move || file_sha256(&path)).await?
}

/// Truncated hex SHA-256 of a key string.
pub fn short_key(data: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.as_bytes());
    let mut hex = format!("{:x}", hasher.finalize());
    hex.truncate(KEY_LEN);
    hex
}
