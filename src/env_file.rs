// Persistence of the data directory ("Singularity Drive") as a single
// `SINGULARITY_DRIVE=<path>` line in an env file.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use tracing::{info, warn};

pub const DRIVE_KEY: &str = "SINGULARITY_DRIVE";

#[derive(thiserror::Error, Debug)]
pub enum EnvFileError {
    #[error("Failed to create directory {}: {source}", path.display())]
    CreateDrive { path: PathBuf, source: io::Error },
    #[error("Failed to write {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
    #[error("Failed to read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
}

/// Expands a leading `~` with `home`.
pub fn expand_home(path: &str, home: &Path) -> PathBuf {
    match path.strip_prefix('~') {
        Some("") => home.to_path_buf(),
        Some(rest) if rest.starts_with('/') => home.join(rest.trim_start_matches('/')),
        _ => PathBuf::from(path),
    }
}

// Plain paths are written bare. Anything env syntax would split or expand
// goes in double quotes.
fn env_value(path: &Path) -> String {
    let raw = path.display().to_string();
    if !raw.contains(|c: char| c.is_whitespace() || matches!(c, '#' | '"' | '\'' | '$' | '\\')) {
        return raw;
    }
    let mut quoted = String::with_capacity(raw.len() + 2);
    quoted.push('"');
    for c in raw.chars() {
        if matches!(c, '"' | '$' | '\\') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// Creates `drive` if needed, then overwrites `env_file` with its path.
/// Returns whether the directory had to be created.
pub fn save_drive_path(env_file: &Path, drive: &Path) -> Result<bool, EnvFileError> {
    let created = !drive.exists();
    if created {
        fs::create_dir_all(drive).map_err(|source| EnvFileError::CreateDrive {
            path: drive.to_path_buf(),
            source,
        })?;
        info!(path = %drive.display(), "Created data directory");
    }
    if let Some(parent) = env_file.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| EnvFileError::Write {
            path: env_file.to_path_buf(),
            source,
        })?;
    }
    fs::write(env_file, format!("{DRIVE_KEY}={}\n", env_value(drive))).map_err(|source| {
        EnvFileError::Write {
            path: env_file.to_path_buf(),
            source,
        }
    })?;
    info!(env_file = %env_file.display(), drive = %drive.display(), "Saved data directory");
    Ok(created)
}

/// Reads the saved data directory back. A missing file is `Ok(None)`.
/// Lines that are not valid env syntax are skipped.
pub fn read_drive_path(env_file: &Path) -> Result<Option<PathBuf>, EnvFileError> {
    let entries = match dotenvy::from_path_iter(env_file) {
        Ok(entries) => entries,
        Err(dotenvy::Error::Io(e)) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(dotenvy::Error::Io(source)) => {
            return Err(EnvFileError::Read {
                path: env_file.to_path_buf(),
                source,
            });
        }
        Err(e) => {
            return Err(EnvFileError::Read {
                path: env_file.to_path_buf(),
                source: io::Error::other(e),
            });
        }
    };

    let mut drive = None;
    for entry in entries {
        match entry {
            Ok((key, value)) if key == DRIVE_KEY => drive = Some(value),
            Ok(_) => {}
            Err(dotenvy::Error::Io(source)) => {
                return Err(EnvFileError::Read {
                    path: env_file.to_path_buf(),
                    source,
                });
            }
            Err(e) => warn!(env_file = %env_file.display(), error = %e, "Skipping malformed env line"),
        }
    }
    Ok(drive.filter(|value| !value.is_empty()).map(PathBuf::from))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_tilde() {
        let home = Path::new("/home/ada");
        assert_eq!(expand_home("~/Singularity", home), PathBuf::from("/home/ada/Singularity"));
        assert_eq!(expand_home("~", home), PathBuf::from("/home/ada"));
        assert_eq!(expand_home("/srv/data", home), PathBuf::from("/srv/data"));
        assert_eq!(expand_home("~bob/x", home), PathBuf::from("~bob/x"));
    }

    #[test]
    fn save_creates_drive_and_writes_single_line() {
        let tmp = tempfile::tempdir().unwrap();
        let drive = tmp.path().join("drive");
        let env_file = tmp.path().join(".env");
        fs::write(&env_file, "OTHER=1\n").unwrap();

        assert!(save_drive_path(&env_file, &drive).unwrap());
        assert!(drive.is_dir());
        assert_eq!(
            fs::read_to_string(&env_file).unwrap(),
            format!("SINGULARITY_DRIVE={}\n", drive.display())
        );
        // second save finds the directory
        assert!(!save_drive_path(&env_file, &drive).unwrap());
    }

    #[test]
    fn read_back() {
        let tmp = tempfile::tempdir().unwrap();
        let env_file = tmp.path().join(".env");
        assert_eq!(read_drive_path(&env_file).unwrap(), None);

        fs::write(&env_file, "# comment\nFOO=bar\nSINGULARITY_DRIVE=\"/mnt/ai\"\n").unwrap();
        assert_eq!(read_drive_path(&env_file).unwrap(), Some(PathBuf::from("/mnt/ai")));

        fs::write(&env_file, "SINGULARITY_DRIVE=\n").unwrap();
        assert_eq!(read_drive_path(&env_file).unwrap(), None);
    }

    #[test]
    fn read_follows_env_syntax() {
        let tmp = tempfile::tempdir().unwrap();
        let env_file = tmp.path().join(".env");

        fs::write(&env_file, "SINGULARITY_DRIVE='/mnt/ai'\n").unwrap();
        assert_eq!(read_drive_path(&env_file).unwrap(), Some(PathBuf::from("/mnt/ai")));

        fs::write(&env_file, "export SINGULARITY_DRIVE=/mnt/ai\n").unwrap();
        assert_eq!(read_drive_path(&env_file).unwrap(), Some(PathBuf::from("/mnt/ai")));

        fs::write(&env_file, "SINGULARITY_DRIVE=/mnt/ai # data disk\n").unwrap();
        assert_eq!(read_drive_path(&env_file).unwrap(), Some(PathBuf::from("/mnt/ai")));
    }

    #[test]
    fn written_file_reads_back() {
        let tmp = tempfile::tempdir().unwrap();
        let drive = tmp.path().join("my drive");
        let env_file = tmp.path().join(".env");
        save_drive_path(&env_file, &drive).unwrap();
        assert_eq!(read_drive_path(&env_file).unwrap(), Some(drive));
    }

    #[test]
    fn unwritable_drive_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("plain-file");
        fs::write(&file, "").unwrap();
        let err = save_drive_path(&tmp.path().join(".env"), &file.join("drive")).unwrap_err();
        assert!(matches!(err, EnvFileError::CreateDrive { .. }));
    }
}
