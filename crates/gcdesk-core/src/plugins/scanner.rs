//! Bundle file enumeration.

use std::io;
use std::path::{Path, PathBuf};
use std::vec;

/// Iterator over candidate bundle files in one directory.
///
/// Yields regular files whose extension matches, sorted by path. A missing
/// directory yields nothing. The first I/O error ends the listing: the files
/// matched before it are yielded, then the error, once.
#[derive(Debug)]
pub struct BundleScanner {
    extension: String,
    state: ScanState,
}

#[derive(Debug)]
enum ScanState {
    Pending(PathBuf),
    Listed {
        paths: vec::IntoIter<PathBuf>,
        error: Option<io::Error>,
    },
}

impl BundleScanner {
    pub fn new(dir: impl AsRef<Path>, extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
            state: ScanState::Pending(dir.as_ref().to_path_buf()),
        }
    }

    fn matches(&self, path: &Path) -> bool {
        path.is_file()
            && path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(&self.extension))
    }

    fn list(&self, dir: &Path) -> (Vec<PathBuf>, Option<io::Error>) {
        if !dir.is_dir() {
            tracing::debug!(dir = %dir.display(), "Plug-in directory not present");
            return (Vec::new(), None);
        }

        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => return (Vec::new(), Some(e)),
        };

        let mut paths = Vec::new();
        let mut error = None;
        for entry in entries {
            match entry {
                Ok(entry) => {
                    let path = entry.path();
                    if self.matches(&path) {
                        paths.push(path);
                    }
                }
                Err(e) => {
                    error = Some(e);
                    break;
                }
            }
        }
        paths.sort();
        (paths, error)
    }
}

impl Iterator for BundleScanner {
    type Item = io::Result<PathBuf>;

    fn next(&mut self) -> Option<Self::Item> {
        if let ScanState::Pending(dir) = &self.state {
            let (paths, error) = self.list(dir);
            self.state = ScanState::Listed {
                paths: paths.into_iter(),
                error,
            };
        }

        match &mut self.state {
            ScanState::Listed { paths, error } => match paths.next() {
                Some(path) => Some(Ok(path)),
                None => error.take().map(Err),
            },
            ScanState::Pending(_) => None,
        }
    }
}
