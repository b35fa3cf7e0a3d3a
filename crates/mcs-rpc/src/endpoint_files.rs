//! File-based address exchange.
//!
//! A provider publishes two sibling files into its configured directory:
//! `PROVIDER` holds its `Connectable` and `PID` its process id, one line
//! each. Both are written atomically (temp file + rename), so a parent that
//! sees the `PROVIDER` file may treat the provider as ready.

use std::path::Path;

use mcs_dtyp::read::{self, FromFileError};
use mcs_dtyp::Connectable;

pub const PROVIDER: &str = "PROVIDER";
pub const PID: &str = "PID";

pub fn write(directory: &Path, connectable: &Connectable) -> std::io::Result<()> {
    write_atomically(&directory.join(PROVIDER), &format!("{connectable}\n"))?;
    write_atomically(&directory.join(PID), &format!("{}\n", std::process::id()))
}

pub fn read_provider(directory: &Path) -> Result<Connectable, FromFileError> {
    read::from_file(directory.join(PROVIDER))
}

pub fn read_pid(directory: &Path) -> Result<u32, FromFileError> {
    read::from_file(directory.join(PID))
}

fn write_atomically(path: &Path, contents: &str) -> std::io::Result<()> {
    let mut temporary = path.as_os_str().to_owned();
    temporary.push(".tmp");
    let temporary = std::path::PathBuf::from(temporary);
    std::fs::write(&temporary, contents)?;
    std::fs::rename(&temporary, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_and_read_back() {
        let directory = tempfile::tempdir().unwrap();
        let connectable = Connectable::tcp("127.0.0.1", 4711);
        write(directory.path(), &connectable).unwrap();
        assert_eq!(read_provider(directory.path()).unwrap(), connectable);
        assert_eq!(read_pid(directory.path()).unwrap(), std::process::id());
    }
}
