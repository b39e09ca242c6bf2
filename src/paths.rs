//! Path string helpers in the style of Node's `path` module
//!
//! These work on `/`-separated strings as the client sees them, not on host
//! `Path`s.

/// Join path segments, dropping empty and `.` segments and resolving `..`
///
/// ```
/// use appview_bridge::paths::join;
///
/// assert_eq!(join(&["www", "./js", "../css", "site.css"]), "www/css/site.css");
/// ```
pub fn join(parts: &[&str]) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in parts.iter().flat_map(|part| part.split('/')) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Last segment of a path, optionally with `ext` stripped
///
/// ```
/// use appview_bridge::paths::basename;
///
/// assert_eq!(basename("www/index.html", None), "index.html");
/// assert_eq!(basename("www/index.html", Some(".html")), "index");
/// ```
pub fn basename<'a>(path: &'a str, ext: Option<&str>) -> &'a str {
    let base = path.rsplit('/').next().unwrap_or(path);
    match ext {
        Some(ext) if !ext.is_empty() && base.len() > ext.len() && base.ends_with(ext) => {
            &base[..base.len() - ext.len()]
        }
        _ => base,
    }
}

/// Extension of the last segment, including the dot, or `""`
pub fn extname(path: &str) -> &str {
    let base = basename(path, None);
    match base.rfind('.') {
        Some(0) | None => "",
        Some(idx) => &base[idx..],
    }
}

/// Everything before the last segment, or `""` for a bare name
pub fn dirname(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) => "/",
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// Whether `path` lies under `root`
///
/// Mirrors the client's notion of "absolute": a path is absolute when it
/// starts with the documents directory.
pub fn is_absolute(path: &str, root: &str) -> bool {
    let root = root.trim_end_matches('/');
    !root.is_empty()
        && (path == root || path.strip_prefix(root).is_some_and(|rest| rest.starts_with('/')))
}

/// Last non-empty path segment of a URL, used to name downloaded files
///
/// Returns `None` for unparseable URLs and for URLs whose path has no named
/// segment (e.g. `https://example.com/`).
pub fn url_basename(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    parsed
        .path_segments()?
        .rev()
        .find(|segment| !segment.is_empty())
        .map(str::to_string)
}
