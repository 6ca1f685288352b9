use std::{fmt, path::Path};

use sha2::{Digest, Sha256};

const PREFIX: &str = "autorun";
const HASH_LEN: usize = 12;
const MAX_BASENAME: usize = 64;

/// Name of the isolation unit a task runs in.
///
/// `autorun-<12 hex chars of sha256(path)>-<sanitized basename>`: stable for a path, distinct across paths,
/// and only made of characters systemd accepts in unit names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnitId(String);

impl UnitId {
    pub fn for_path(path: &Path) -> Self {
        let digest = Sha256::digest(path.as_os_str().as_encoded_bytes());
        let hash = hex::encode(digest);

        let basename = path
            .file_name()
            .map(|n| sanitize(&n.to_string_lossy()))
            .unwrap_or_default();

        Self(format!("{PREFIX}-{}-{basename}", &hash[..HASH_LEN]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .take(MAX_BASENAME)
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '_' | '.' | '-' => c,
            _ => '_',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_for_same_path() {
        let p = Path::new("/srv/notebooks/report-autorun.ipynb");
        assert_eq!(UnitId::for_path(p), UnitId::for_path(p));
    }

    #[test]
    fn distinct_paths_distinct_ids() {
        let a = UnitId::for_path(Path::new("/srv/a/job-autorun.ipynb"));
        let b = UnitId::for_path(Path::new("/srv/b/job-autorun.ipynb"));
        assert_ne!(a, b);
        assert!(a.as_str().ends_with("-job-autorun.ipynb"));
        assert!(b.as_str().ends_with("-job-autorun.ipynb"));
    }

    #[test]
    fn shape_and_sanitizing() {
        let id = UnitId::for_path(Path::new("/srv/weekly sales (v2)-autorun.ipynb"));
        let s = id.as_str();
        assert!(s.starts_with("autorun-"));

        let hash = &s["autorun-".len().."autorun-".len() + HASH_LEN];
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(s.ends_with("-weekly_sales__v2_-autorun.ipynb"));
        assert!(
            s.chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        );
    }
}
