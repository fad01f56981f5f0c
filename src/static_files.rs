//! Serving files from a directory.
//!
//! The route side (redirect, index, catch-all) lives in
//! [`RouteGroup::static_files`](crate::RouteGroup::static_files); this module
//! only turns a relative file path into response bytes.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use http::StatusCode;
use tracing::warn;

use crate::context::Context;
use crate::response::ContentType;

pub(crate) struct FileServer {
    root: PathBuf,
}

impl FileServer {
    pub(crate) fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Writes the file at `relative` (under the root) to the response.
    /// Directories, including the empty path, serve their `index.html`.
    pub(crate) fn serve(&self, ctx: &mut Context, relative: &str) {
        let Some(mut path) = self.resolve(relative) else {
            ctx.text(StatusCode::NOT_FOUND, "404 page not found");
            return;
        };
        if path.is_dir() {
            path.push("index.html");
        }

        match std::fs::read(&path) {
            Ok(bytes) => {
                let content_type = path.extension()
                    .and_then(|ext| ext.to_str())
                    .map_or(ContentType::OctetStream, ContentType::from_extension);
                ctx.bytes(StatusCode::OK, content_type, &bytes);
            }
            Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::PermissionDenied) => {
                ctx.text(StatusCode::NOT_FOUND, "404 page not found");
            }
            Err(e) => {
                warn!(path = %path.display(), "static file read failed: {e}");
                ctx.status(StatusCode::INTERNAL_SERVER_ERROR);
            }
        }
    }

    /// Maps a request path onto the root. Only plain name segments are
    /// allowed, so `..`, absolute paths and drive prefixes never resolve.
    fn resolve(&self, relative: &str) -> Option<PathBuf> {
        let mut path = self.root.clone();
        for component in Path::new(relative).components() {
            match component {
                Component::Normal(segment) => path.push(segment),
                Component::CurDir => {}
                _ => return None,
            }
        }
        Some(path)
    }
}
