use crate::config::OutputConfig;
use crate::url::timestamp_now;
use std::path::{Path, PathBuf};

/// Substitutes `%TARGET%`, `%TYPE%` and `%TIMESTAMP%` in a naming pattern
pub fn apply_pattern(pattern: &str, target: &str, kind: &str, timestamp: &str) -> String {
    pattern
        .replace("%TARGET%", target)
        .replace("%TYPE%", kind)
        .replace("%TIMESTAMP%", timestamp)
}

/// Output path layout: `<directory>/<folder pattern>/<file pattern>`
#[derive(Debug, Clone)]
pub struct OutputNaming {
    directory: PathBuf,
    folder: String,
    file: String,
}

impl OutputNaming {
    pub fn new(directory: impl Into<PathBuf>, folder: &str, file: &str) -> Self {
        Self {
            directory: directory.into(),
            folder: folder.to_string(),
            file: file.to_string(),
        }
    }

    pub fn from_config(config: &OutputConfig) -> Self {
        Self::new(&config.directory, &config.folder_naming, &config.file_naming)
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Base path (without extension) for the `kind` output of `target`
    pub fn output_path(&self, target: &str, kind: &str) -> PathBuf {
        self.output_path_at(target, kind, &timestamp_now())
    }

    pub fn output_path_at(&self, target: &str, kind: &str, timestamp: &str) -> PathBuf {
        let folder = apply_pattern(&self.folder, target, kind, timestamp);
        let file = apply_pattern(&self.file, target, kind, timestamp);
        self.directory.join(folder).join(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_pattern() {
        assert_eq!(
            apply_pattern("%TIMESTAMP%-%TYPE%", "jane.doe", "friends", "20170714-024000"),
            "20170714-024000-friends"
        );
        assert_eq!(
            apply_pattern("%TARGET%/%TARGET%", "jane.doe", "posts", "t"),
            "jane.doe/jane.doe"
        );
    }

    #[test]
    fn test_output_path_layout() {
        let naming = OutputNaming::new("/tmp/out", "%TARGET%", "%TIMESTAMP%-%TYPE%");
        assert_eq!(
            naming.output_path_at("100004", "posts", "20170714-024000"),
            PathBuf::from("/tmp/out/100004/20170714-024000-posts")
        );
    }
}
