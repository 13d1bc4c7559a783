//! Instruction-file loading.
//!
//! Agent instructions can live next to the workflow definition. A missing or
//! unreadable file never fails the load: the caller's default is used and a
//! warning is logged.

use std::path::Path;
use tracing::{debug, warn};

/// Read an instruction file, falling back to `default` when it can't be read.
pub fn load_instruction(path: &Path, default: &str) -> String {
    match std::fs::read_to_string(path) {
        Ok(text) => {
            debug!(path = %path.display(), "Loaded instruction file");
            text
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "Instruction file not found, using default instruction");
            default.to_string()
        }
        Err(e) => {
            warn!(
                path = %path.display(),
                error = %e,
                "Failed to read instruction file, using default instruction"
            );
            default.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scriptwriter_instruction.txt");
        std::fs::write(&path, "Write a 30 second script about {topic}.").unwrap();

        let text = load_instruction(&path, "Default instruction");
        assert_eq!(text, "Write a 30 second script about {topic}.");
    }

    #[test]
    fn missing_file_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let text = load_instruction(&dir.path().join("absent.txt"), "Default instruction");
        assert_eq!(text, "Default instruction");
    }

    #[test]
    fn directory_path_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let text = load_instruction(dir.path(), "fallback");
        assert_eq!(text, "fallback");
    }
}
