//! Slash-separated path handling shared by URL building and the response
//! checker. Always uses `/`, whatever the host separator is.

/// Lexically normalizes a slash-separated path: repeated separators collapse,
/// `.` elements are dropped, `..` removes the preceding element and a trailing
/// separator is removed. An empty result becomes `.` (or `/` when rooted).
pub fn clean(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }
    let rooted = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => continue,
            ".." => {
                if parts.last().is_some_and(|last| *last != "..") {
                    parts.pop();
                } else if !rooted {
                    // `..` cannot climb above the root of an absolute path.
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }
    let joined = parts.join("/");
    if rooted {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

/// Joins the non-empty segments with `/` and cleans the result. Returns an
/// empty string when every segment is empty.
pub fn join<S: AsRef<str>>(segments: &[S]) -> String {
    let parts: Vec<&str> = segments
        .iter()
        .map(AsRef::as_ref)
        .filter(|segment| !segment.is_empty())
        .collect();
    if parts.is_empty() {
        return String::new();
    }
    clean(&parts.join("/"))
}
