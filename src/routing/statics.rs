//! Static page and data file resolution.
//!
//! Request paths map onto two roots:
//!
//! ```text
//! ""  or "/"          → <pages>/default/default.html
//! /data/<rest>        → <data>/<rest>
//! /<name>             → <pages>/<name>/<name>.html
//! /<stem>.css|.js     → <pages>/<stem>/<stem>.css|.js
//! anything else       → <pages>/<path>
//! missing file        → <pages>/default/default.html, else 404
//! ```
//!
//! Literal `..` sequences are removed before mapping. This is a coarse guard,
//! not canonicalization.

use std::path::{Path, PathBuf};

use crate::config::StaticConfig;
use crate::http::response::{Response, TEXT_PLAIN};

const DEFAULT_PAGE: &str = "default";
const DATA_PREFIX: &str = "/data/";

/// Content type for a file, from its extension.
pub fn content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("html") => "text/html",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

/// Strip literal `..` sequences from a request path.
pub fn strip_traversal(path: &str) -> String {
    path.replace("..", "")
}

/// Maps request paths to files under the page and data roots.
#[derive(Debug, Clone)]
pub struct StaticResolver {
    pages_root: PathBuf,
    data_root: PathBuf,
}

impl StaticResolver {
    pub fn new(pages_root: impl Into<PathBuf>, data_root: impl Into<PathBuf>) -> Self {
        Self {
            pages_root: pages_root.into(),
            data_root: data_root.into(),
        }
    }

    pub fn from_config(config: &StaticConfig) -> Self {
        Self::new(&config.pages_root, &config.data_root)
    }

    /// The page served when nothing else matches.
    pub fn default_page(&self) -> PathBuf {
        self.page_folder(DEFAULT_PAGE)
    }

    /// Filesystem location for a request path, before existence checks.
    pub fn resolve_path(&self, request_path: &str) -> PathBuf {
        let path = if request_path.is_empty() || request_path == "/" {
            "/default".to_string()
        } else {
            strip_traversal(request_path)
        };

        if let Some(rest) = path.strip_prefix(DATA_PREFIX) {
            return self.data_root.join(rest.trim_start_matches('/'));
        }

        let relative = path.trim_start_matches('/');
        let as_path = Path::new(&path);
        let ext = match as_path.extension().and_then(|e| e.to_str()) {
            None => return self.page_folder(relative),
            Some(ext) => ext.to_ascii_lowercase(),
        };

        let single_segment = path.matches('/').count() == 1;
        if (ext == "css" || ext == "js") && single_segment {
            if let (Some(stem), Some(file)) = (as_path.file_stem(), as_path.file_name()) {
                return self.pages_root.join(stem).join(file);
            }
        }
        self.pages_root.join(relative)
    }

    /// Serve the file for `request_path`, falling back to the default page.
    pub async fn serve(&self, request_path: &str) -> Response {
        let mut file = self.resolve_path(request_path);
        if !is_file(&file).await {
            file = self.default_page();
            if !is_file(&file).await {
                return Response::raw(404, TEXT_PLAIN, b"Default page not found".to_vec());
            }
        }

        match tokio::fs::read(&file).await {
            Ok(bytes) => Response::raw(200, content_type(&file), bytes),
            Err(e) => {
                tracing::error!(file = %file.display(), error = %e, "Failed to read static file");
                Response::raw(500, TEXT_PLAIN, b"Failed to read file".to_vec())
            }
        }
    }

    fn page_folder(&self, name: &str) -> PathBuf {
        self.pages_root.join(name).join(format!("{}.html", name))
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> StaticResolver {
        StaticResolver::new("pages", "data")
    }

    #[test]
    fn maps_request_paths() {
        let r = resolver();
        let cases = [
            ("", "pages/default/default.html"),
            ("/", "pages/default/default.html"),
            ("/login", "pages/login/login.html"),
            ("/login.js", "pages/login/login.js"),
            ("/admin.CSS", "pages/admin/admin.CSS"),
            ("/admin/admin.js", "pages/admin/admin.js"),
            ("/img/logo.png", "pages/img/logo.png"),
            ("/favicon.ico", "pages/favicon.ico"),
            ("/data/server.log", "data/server.log"),
            ("/data//etc/passwd", "data/etc/passwd"),
        ];
        for (input, expected) in cases {
            assert_eq!(r.resolve_path(input), PathBuf::from(expected), "{}", input);
        }
    }

    #[test]
    fn dot_dot_sequences_are_removed() {
        let r = resolver();
        assert_eq!(r.resolve_path("/../secret"), PathBuf::from("pages/secret/secret.html"));
        assert_eq!(r.resolve_path("/data/../../x.txt"), PathBuf::from("data/x.txt"));
    }

    #[test]
    fn content_types() {
        assert_eq!(content_type(Path::new("a/b.html")), "text/html");
        assert_eq!(content_type(Path::new("a.JPEG")), "image/jpeg");
        assert_eq!(content_type(Path::new("a.svg")), "image/svg+xml");
        assert_eq!(content_type(Path::new("a.wasm")), "application/octet-stream");
        assert_eq!(content_type(Path::new("noext")), "application/octet-stream");
    }

    #[tokio::test]
    async fn serves_file_or_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let pages = dir.path().join("pages");
        std::fs::create_dir_all(pages.join("default")).unwrap();
        std::fs::create_dir_all(pages.join("login")).unwrap();
        std::fs::write(pages.join("default/default.html"), "default").unwrap();
        std::fs::write(pages.join("login/login.html"), "login").unwrap();
        let r = StaticResolver::new(&pages, dir.path().join("data"));

        let login = r.serve("/login").await;
        assert_eq!(login.status(), 200);
        assert_eq!(login.body(), b"login");
        assert_eq!(login.content_type(), "text/html");

        let fallback = r.serve("/nowhere").await;
        assert_eq!(fallback.status(), 200);
        assert_eq!(fallback.body(), b"default");
    }

    #[tokio::test]
    async fn missing_default_page_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let r = StaticResolver::new(dir.path(), dir.path());

        let response = r.serve("/").await;
        assert_eq!(response.status(), 404);
        assert_eq!(response.body(), b"Default page not found");
    }
}
