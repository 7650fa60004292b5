use std::path::{Path, PathBuf};

/// Rewrite backslash separators to `/`.
///
/// SFZ files written on Windows commonly use `\`. The resolved tree always
/// uses `/` so that it reads the same on every platform.
pub fn normalize_separators(path: &str) -> String {
    path.replace('\\', "/")
}

/// Prefix a sample path with a `default_path`
///
/// - An absolute sample path is returned as-is (after separator normalization)
/// - Otherwise a `/` is inserted between the two parts when the prefix does
///   not already end with one
///
/// # Example
///
/// ```
/// use nanoconv_sfz::path_utils::combine_sample_path;
///
/// assert_eq!(combine_sample_path("samples/piano", "C4.wav"), "samples/piano/C4.wav");
/// assert_eq!(combine_sample_path("samples\\piano\\", "C4.wav"), "samples/piano/C4.wav");
/// assert_eq!(combine_sample_path("samples/", "/abs/C4.wav"), "/abs/C4.wav");
/// ```
pub fn combine_sample_path(default_path: &str, sample_path: &str) -> String {
    let sample = normalize_separators(sample_path);
    if is_absolute(&sample) {
        return sample;
    }

    let mut combined = normalize_separators(default_path);
    if !combined.is_empty() && !combined.ends_with('/') {
        combined.push('/');
    }
    combined.push_str(&sample);
    combined
}

/// Locate a sample recorded in the tree on disk, relative to the directory
/// of the SFZ file it came from.
pub fn resolve_sample_file(base_dir: &Path, sample_path: &str) -> PathBuf {
    let sample = normalize_separators(sample_path);
    let path = Path::new(&sample);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

fn is_absolute(path: &str) -> bool {
    // `C:/...` counts as absolute even off Windows
    let drive = path.as_bytes().get(1) == Some(&b':') && path.as_bytes()[0].is_ascii_alphabetic();
    path.starts_with('/') || drive || Path::new(path).is_absolute()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_separators() {
        assert_eq!(normalize_separators("samples\\piano\\C4.wav"), "samples/piano/C4.wav");
        assert_eq!(normalize_separators("samples/piano/C4.wav"), "samples/piano/C4.wav");
    }

    #[test]
    fn test_combine_sample_path() {
        assert_eq!(combine_sample_path("samples/piano/", "C4.wav"), "samples/piano/C4.wav");
        assert_eq!(combine_sample_path("samples/piano", "C4.wav"), "samples/piano/C4.wav");
        assert_eq!(combine_sample_path("", "C4.wav"), "C4.wav");
        assert_eq!(combine_sample_path("samples", "sub\\C4.wav"), "samples/sub/C4.wav");
        assert_eq!(combine_sample_path("samples/", "/samples/C4.wav"), "/samples/C4.wav");
        assert_eq!(combine_sample_path("samples/", "C:\\x\\C4.wav"), "C:/x/C4.wav");
    }

    #[test]
    fn test_resolve_sample_file() {
        let base = Path::new("/music/instruments");
        assert_eq!(
            resolve_sample_file(base, "samples\\piano.wav"),
            PathBuf::from("/music/instruments/samples/piano.wav")
        );
        #[cfg(not(windows))]
        assert_eq!(
            resolve_sample_file(base, "/abs/piano.wav"),
            PathBuf::from("/abs/piano.wav")
        );
    }
}
