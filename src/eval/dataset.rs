use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// One labeled image: `<root>/<ground_truth>/<file_name>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sample {
    pub path: PathBuf,
    pub file_name: String,
    pub ground_truth: String,
}

/// Enumerate samples under `root`, sorted by label then file name.
///
/// Only files directly inside an immediate subdirectory count; files at the root and
/// deeper nesting are ignored, as are non-image extensions. An unreadable label
/// directory or entry is logged and skipped; only a missing or unreadable root fails.
pub fn collect_samples(root: &Path) -> Result<Vec<Sample>> {
    if !root.is_dir() {
        return Err(anyhow!("dataset directory {} does not exist", root.display()));
    }
    let mut samples = Vec::new();
    for entry in WalkDir::new(root)
        .min_depth(2)
        .max_depth(2)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() == 0 => {
                return Err(anyhow!("failed to walk {}: {}", root.display(), err));
            }
            Err(err) => {
                log::warn!("skipping dataset entry: {}", err);
                continue;
            }
        };
        if !entry.file_type().is_file() || !is_image(entry.path()) {
            continue;
        }
        let ground_truth = entry
            .path()
            .parent()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned());
        let Some(ground_truth) = ground_truth else {
            continue;
        };
        samples.push(Sample {
            file_name: entry.file_name().to_string_lossy().into_owned(),
            path: entry.into_path(),
            ground_truth,
        });
    }
    Ok(samples)
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn collects_label_directories_in_order() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let root = dir.path();
        fs::create_dir_all(root.join("banana"))?;
        fs::create_dir_all(root.join("apple/nested"))?;
        fs::write(root.join("banana/b.PNG"), b"")?;
        fs::write(root.join("apple/2.jpeg"), b"")?;
        fs::write(root.join("apple/1.jpg"), b"")?;
        fs::write(root.join("apple/notes.txt"), b"")?;
        fs::write(root.join("apple/nested/deep.jpg"), b"")?;
        fs::write(root.join("stray.jpg"), b"")?;

        let samples = collect_samples(root)?;
        let listed: Vec<(&str, &str)> = samples
            .iter()
            .map(|s| (s.ground_truth.as_str(), s.file_name.as_str()))
            .collect();
        assert_eq!(
            listed,
            vec![("apple", "1.jpg"), ("apple", "2.jpeg"), ("banana", "b.PNG")]
        );
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_label_directory_is_skipped() -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir()?;
        let root = dir.path();
        fs::create_dir_all(root.join("apple"))?;
        fs::create_dir_all(root.join("banana"))?;
        fs::write(root.join("apple/a.jpg"), b"")?;
        fs::write(root.join("banana/b.jpg"), b"")?;
        fs::set_permissions(root.join("banana"), fs::Permissions::from_mode(0o000))?;

        let result = collect_samples(root);
        fs::set_permissions(root.join("banana"), fs::Permissions::from_mode(0o755))?;

        let samples = result?;
        assert_eq!(samples[0].ground_truth, "apple");
        assert_eq!(samples[0].file_name, "a.jpg");
        // Privileged users can still read `banana`; everyone else loses only that label.
        assert!(samples.len() <= 2);
        Ok(())
    }

    #[test]
    fn missing_root_is_an_error() {
        assert!(collect_samples(Path::new("/nonexistent/dataset")).is_err());
    }
}
