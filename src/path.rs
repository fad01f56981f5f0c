//! Route path composition.
//!
//! Groups hand their prefix down to children, and every registration joins
//! that prefix with a relative path. The join is lexical, POSIX style, with
//! one twist: a trailing slash on the relative path survives, since
//! `/files/` and `/files` can be different routes.

/// Joins a group prefix and a relative route path.
///
/// ```rust
/// use gantry::path::compose;
///
/// assert_eq!(compose("/api", "users"), "/api/users");
/// assert_eq!(compose("/api", "/users/"), "/api/users/");
/// assert_eq!(compose("/api", ""), "/api");
/// ```
pub fn compose(base: &str, relative: &str) -> String {
    if relative.is_empty() {
        return base.to_owned();
    }

    let mut joined = if base.is_empty() {
        clean(relative)
    } else {
        clean(&format!("{base}/{relative}"))
    };

    if relative.ends_with('/') && !joined.ends_with('/') {
        joined.push('/');
    }
    joined
}

/// Lexically normalizes a slash-separated path.
///
/// Repeated slashes collapse, `.` segments disappear, `..` removes the
/// segment before it (and is dropped at the root of a rooted path). The
/// result never ends in `/` unless it is exactly `/`. An empty input, or one
/// that normalizes to nothing, yields `.`.
pub fn clean(path: &str) -> String {
    if path.is_empty() {
        return ".".to_owned();
    }

    let rooted = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();
    // Leading `..` segments a relative path cannot resolve.
    let mut unresolved = 0usize;

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() && !rooted {
                    unresolved += 1;
                }
            }
            s => segments.push(s),
        }
    }

    let mut out = String::with_capacity(path.len());
    if rooted {
        out.push('/');
    }
    for i in 0..unresolved {
        if i > 0 {
            out.push('/');
        }
        out.push_str("..");
    }
    for (i, segment) in segments.iter().enumerate() {
        if i > 0 || unresolved > 0 {
            out.push('/');
        }
        out.push_str(segment);
    }

    if out.is_empty() {
        out.push('.');
    }
    out
}
