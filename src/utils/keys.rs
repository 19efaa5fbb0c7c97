/// Splits an object key into its directory prefix and file name.
///
/// `"a/b/c.jpg"` becomes `("a/b", "c.jpg")`, a key without a slash has an
/// empty directory.
pub fn split_key(key: &str) -> (&str, &str) {
    match key.rfind('/') {
        Some(idx) => (&key[..idx], &key[idx + 1..]),
        None => ("", key),
    }
}

/// Returns the extension of the key's file name including the leading dot.
///
/// Dotfiles such as `.png` and names without a dot have no extension.
pub fn extension(key: &str) -> Option<&str> {
    let (_, file_name) = split_key(key);
    match file_name.rfind('.') {
        Some(idx) if idx > 0 => Some(&file_name[idx..]),
        _ => None,
    }
}

/// File name with its extension removed.
pub fn base_name(key: &str) -> &str {
    let (_, file_name) = split_key(key);
    match file_name.rfind('.') {
        Some(idx) if idx > 0 => &file_name[..idx],
        _ => file_name,
    }
}

/// Computes the derivative key for `key`, keeping its directory prefix.
pub fn derivative_key(key: &str, target_extension: &str) -> String {
    let (dir, _) = split_key(key);
    let target = target_extension.trim_start_matches('.');
    if dir.is_empty() {
        format!("{}.{}", base_name(key), target)
    } else {
        format!("{}/{}.{}", dir, base_name(key), target)
    }
}

/// Normalizes a configured extension to the `.ext` form.
pub fn normalize_extension(ext: &str) -> String {
    let trimmed = ext.trim();
    if trimmed.is_empty() || trimmed.starts_with('.') {
        trimmed.to_string()
    } else {
        format!(".{}", trimmed)
    }
}

/// Set of extensions with a configurable case policy.
#[derive(Debug, Clone)]
pub struct ExtensionMatcher {
    extensions: Vec<String>,
    case_insensitive: bool,
}

impl ExtensionMatcher {
    pub fn new<I, S>(extensions: I, case_insensitive: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .map(|e| normalize_extension(e.as_ref()))
            .filter(|e| !e.is_empty())
            .map(|e| if case_insensitive { e.to_lowercase() } else { e })
            .collect();
        Self {
            extensions,
            case_insensitive,
        }
    }

    /// Exact membership test against every configured extension.
    pub fn contains(&self, ext: &str) -> bool {
        if self.case_insensitive {
            let ext = ext.to_lowercase();
            self.extensions.iter().any(|allowed| *allowed == ext)
        } else {
            self.extensions.iter().any(|allowed| allowed == ext)
        }
    }

    /// Whether the key's own extension is in the set.
    pub fn matches_key(&self, key: &str) -> bool {
        extension(key).is_some_and(|ext| self.contains(ext))
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }
}
