use std::path::{Path, PathBuf};

/// Read a `.env` file into the process environment.
///
/// Variables already set in the environment are left alone. A missing file
/// is `Ok(None)`; a malformed one is an error.
pub fn load_dotenv(path: Option<&Path>) -> Result<Option<PathBuf>, dotenvy::Error> {
    let loaded = match path {
        Some(p) => dotenvy::from_path(p).map(|()| p.to_path_buf()),
        None => dotenvy::dotenv(),
    };
    match loaded {
        Ok(p) => Ok(Some(p)),
        Err(e) if e.not_found() => Ok(None),
        Err(e) => Err(e),
    }
}
