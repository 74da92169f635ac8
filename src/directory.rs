//! Read-only staff directory backed by a static JSON file.
//!
//! The file is re-read on every call to [`load`], so edits take effect on the
//! next login without a restart.

use std::path::Path;

use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::err::Error;
use crate::io::read_io_file;
use crate::models::{Role, StaffAccount};

/// Unsalted SHA-256, lowercase hex. This is the format stored in the directory.
pub fn hash_password(plaintext: &str) -> String {
    let mut hasher: Sha256 = Digest::new();
    hasher.update(plaintext.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, Deserialize)]
struct DirectoryFile {
    teachers: Vec<TeacherEntry>,
}

#[derive(Debug, Deserialize)]
struct TeacherEntry {
    username: String,
    password_hash: String,
    name: String,
}

pub async fn load<P: AsRef<Path>>(path: P) -> Result<Vec<StaffAccount>, Error> {
    let path = path.as_ref();
    let bytes = read_io_file(path)
        .await
        .map_err(|err| Error::directory(format!("User directory unavailable: {:#}", err)))?;
    parse(&bytes).map_err(|err| {
        Error::directory(format!(
            "User directory `{}` is malformed: {}",
            path.display(),
            err
        ))
    })
}

fn parse(bytes: &[u8]) -> serde_json::Result<Vec<StaffAccount>> {
    let file: DirectoryFile = serde_json::from_slice(bytes)?;
    Ok(file
        .teachers
        .into_iter()
        .map(|entry| StaffAccount {
            username: entry.username,
            password_hash: entry.password_hash,
            name: entry.name,
            role: Role::Teacher,
        })
        .collect())
}

pub fn authenticate<'a>(
    accounts: &'a [StaffAccount],
    username: &str,
    password: &str,
) -> Option<&'a StaffAccount> {
    let digest = hash_password(password);
    accounts
        .iter()
        .find(|account| account.username == username && account.password_hash == digest)
}
