//! Prediction result file.

use std::{fs, io, path::Path};

const RULE: &str = "==================";

/// Write `result` to `path` inside a small banner, replacing previous contents.
pub fn save_prediction(path: &Path, result: &str) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(
        path,
        format!("Prediction Result:\n{RULE}\n{result}\n{RULE}\n"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_banner_and_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output").join("prediction.txt");
        save_prediction(&path, "first").unwrap();
        save_prediction(&path, r#"{"label":3}"#).unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "Prediction Result:\n==================\n{\"label\":3}\n==================\n"
        );
    }
}
