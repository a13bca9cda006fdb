//! Static files for the web app.
//!
//! Files are served from a single web root. Only files whose extension maps
//! to a known content type are served; anything else, and any path that
//! would leave the root, is refused.

use std::path::{Component, Path, PathBuf};

use bytes::Bytes;

use webradio_core::{Error, Result};

/// Document served for an empty path.
pub const INDEX: &str = "index.html";

/// Content type for a file extension (case-insensitive).
pub fn content_type(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "html" => Some("text/html"),
        "js" => Some("text/javascript"),
        "css" => Some("text/css"),
        "svg" => Some("image/svg+xml"),
        "xml" => Some("text/xml"),
        _ => None,
    }
}

/// Directory holding the app's static files and the station list.
#[derive(Debug, Clone)]
pub struct WebRoot {
    root: PathBuf,
}

impl WebRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        WebRoot { root: root.into() }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Map a request path (already stripped of `/`) onto the file system.
    pub fn resolve(&self, request_path: &str) -> Result<PathBuf> {
        let relative = if request_path.is_empty() {
            INDEX
        } else {
            request_path
        };
        let mut path = self.root.clone();
        for component in Path::new(relative).components() {
            match component {
                Component::Normal(part) => path.push(part),
                Component::CurDir => {}
                _ => {
                    return Err(Error::BadRequest(format!(
                        "path {request_path:?} escapes the web root"
                    )));
                }
            }
        }
        Ok(path)
    }

    /// Read a file and its content type.
    pub async fn read(&self, request_path: &str) -> Result<(Bytes, &'static str)> {
        let path = self.resolve(request_path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        let Some(content_type) = content_type(ext) else {
            return Err(Error::BadRequest(format!(
                "no content type for {request_path:?}"
            )));
        };
        let data = tokio::fs::read(&path).await?;
        Ok((Bytes::from(data), content_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_types() {
        assert_eq!(content_type("html"), Some("text/html"));
        assert_eq!(content_type("JS"), Some("text/javascript"));
        assert_eq!(content_type("css"), Some("text/css"));
        assert_eq!(content_type("svg"), Some("image/svg+xml"));
        assert_eq!(content_type("xml"), Some("text/xml"));
        assert_eq!(content_type("png"), None);
    }

    #[test]
    fn empty_path_is_index() {
        let root = WebRoot::new("/srv/www");
        assert_eq!(root.resolve("").unwrap(), Path::new("/srv/www/index.html"));
        assert_eq!(
            root.resolve("js/WebRadio.js").unwrap(),
            Path::new("/srv/www/js/WebRadio.js")
        );
    }

    #[test]
    fn traversal_is_refused() {
        let root = WebRoot::new("/srv/www");
        for bad in ["../etc/passwd", "js/../../x.html"] {
            assert!(matches!(root.resolve(bad), Err(Error::BadRequest(_))), "{bad}");
        }
    }

    #[tokio::test]
    async fn read_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), b"<html/>").unwrap();
        let root = WebRoot::new(dir.path());
        let (data, ct) = root.read("").await.unwrap();
        assert_eq!(&data[..], b"<html/>");
        assert_eq!(ct, "text/html");
    }

    #[tokio::test]
    async fn unknown_extension_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("logo.png"), b"png").unwrap();
        let root = WebRoot::new(dir.path());
        assert!(matches!(root.read("logo.png").await, Err(Error::BadRequest(_))));
        assert!(matches!(root.read("missing.css").await, Err(Error::Io(_))));
    }
}
