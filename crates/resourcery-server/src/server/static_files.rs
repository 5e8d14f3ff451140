//! Static file responder for the PWA bundle.
//!
//! Serves `GET`/`HEAD` for files under the configured root. Paths are
//! percent-decoded, `..` segments are refused, and the resolved file must
//! stay inside the root after symlinks are followed. Directories redirect to
//! their slash form and serve `index.html`; there are no listings.

use crate::fetch::{empty_body, full_body, BoxError, RelayBody};
use crate::metrics;
use crate::server::headers::{HeadersExt, TEXT_PLAIN};
use anyhow::Context;
use futures::TryStreamExt;
use http_body_util::{BodyExt, StreamBody};
use hyper::body::Frame;
use hyper::header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use hyper::{Method, Request, Response, StatusCode};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

const INDEX_FILE: &str = "index.html";

/// Serves files from a canonicalized root directory.
#[derive(Debug, Clone)]
pub struct StaticFiles {
    root: PathBuf,
}

impl StaticFiles {
    pub fn new(root: impl AsRef<Path>) -> Result<Self, anyhow::Error> {
        let root = root.as_ref();
        let root = std::fs::canonicalize(root)
            .with_context(|| format!("Static root '{}' is not accessible", root.display()))?;
        if !root.is_dir() {
            anyhow::bail!("Static root '{}' is not a directory", root.display());
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn serve<B>(&self, req: &Request<B>) -> Response<RelayBody> {
        let response = self.respond(req).await;
        metrics::record_static(response.status().as_u16());
        response
    }

    async fn respond<B>(&self, req: &Request<B>) -> Response<RelayBody> {
        let head_only = match *req.method() {
            Method::GET => false,
            Method::HEAD => true,
            _ => return text_response(StatusCode::NOT_IMPLEMENTED, "Unsupported method"),
        };

        let raw_path = req.uri().path();
        let relative = match sanitize_path(raw_path) {
            Ok(relative) => relative,
            Err(status) => return text_response(status, reason(status)),
        };

        let mut path = self.root.join(&relative);
        let mut metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) => return io_error_response(&e),
        };

        if metadata.is_dir() {
            if !raw_path.ends_with('/') {
                let location = match req.uri().query() {
                    Some(query) => format!("{raw_path}/?{query}"),
                    None => format!("{raw_path}/"),
                };
                let mut response = text_response(StatusCode::MOVED_PERMANENTLY, "Moved Permanently");
                if !response.set_header_value(&LOCATION, &location) {
                    return text_response(StatusCode::BAD_REQUEST, "Bad Request");
                }
                return response;
            }
            path.push(INDEX_FILE);
            metadata = match tokio::fs::metadata(&path).await {
                Ok(metadata) if metadata.is_file() => metadata,
                Ok(_) => return text_response(StatusCode::NOT_FOUND, "Not Found"),
                Err(e) => return io_error_response(&e),
            };
        }

        // Symlinks may point anywhere; only serve what stays under the root
        match tokio::fs::canonicalize(&path).await {
            Ok(resolved) if resolved.starts_with(&self.root) => {}
            Ok(resolved) => {
                warn!("Refusing to serve '{}' outside the static root", resolved.display());
                return text_response(StatusCode::FORBIDDEN, "Forbidden");
            }
            Err(e) => return io_error_response(&e),
        }

        let content_type = mime_guess::from_path(&path).first_or_octet_stream();
        let body = if head_only {
            empty_body()
        } else {
            match tokio::fs::File::open(&path).await {
                Ok(file) => file_body(file),
                Err(e) => return io_error_response(&e),
            }
        };

        debug!("Serving {} ({} bytes)", path.display(), metadata.len());
        let mut response = Response::new(body);
        response.set_header_value(&CONTENT_TYPE, content_type.as_ref());
        response
            .headers_mut()
            .insert(CONTENT_LENGTH, metadata.len().into());
        response
    }
}

/// Turn a request path into a root-relative path, refusing traversal.
fn sanitize_path(raw_path: &str) -> Result<PathBuf, StatusCode> {
    let decoded = urlencoding::decode(raw_path).map_err(|_| StatusCode::BAD_REQUEST)?;
    let mut relative = PathBuf::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return Err(StatusCode::FORBIDDEN),
            s if s.contains('\\') || s.contains('\0') => return Err(StatusCode::FORBIDDEN),
            s => relative.push(s),
        }
    }
    Ok(relative)
}

fn file_body(file: tokio::fs::File) -> RelayBody {
    let frames = ReaderStream::new(file)
        .map_ok(Frame::data)
        .map_err(|e| -> BoxError { Box::new(e) });
    StreamBody::new(frames).boxed_unsync()
}

fn io_error_response(err: &std::io::Error) -> Response<RelayBody> {
    match err.kind() {
        ErrorKind::NotFound | ErrorKind::NotADirectory => {
            text_response(StatusCode::NOT_FOUND, "Not Found")
        }
        ErrorKind::PermissionDenied => text_response(StatusCode::FORBIDDEN, "Forbidden"),
        _ => {
            warn!("Static file error: {}", err);
            text_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        }
    }
}

fn reason(status: StatusCode) -> &'static str {
    status.canonical_reason().unwrap_or("Error")
}

fn text_response(status: StatusCode, message: &str) -> Response<RelayBody> {
    let mut response = Response::new(full_body(format!("{} {}\n", status.as_u16(), message)));
    *response.status_mut() = status;
    response.set_header(&CONTENT_TYPE, &TEXT_PLAIN);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fixture() -> (tempfile::TempDir, StaticFiles) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("index.html"), "<h1>reSOURCERY</h1>").unwrap();
        fs::write(dir.path().join("app.js"), "console.log(1)").unwrap();
        fs::write(dir.path().join("ffmpeg core.wasm"), [0u8, 97, 115, 109]).unwrap();
        fs::create_dir(dir.path().join("docs")).unwrap();
        fs::write(dir.path().join("docs/index.html"), "docs").unwrap();
        fs::create_dir(dir.path().join("empty")).unwrap();
        let files = StaticFiles::new(dir.path()).unwrap();
        (dir, files)
    }

    fn get(path: &str) -> Request<()> {
        Request::get(path).body(()).unwrap()
    }

    async fn body_string(response: Response<RelayBody>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    #[test]
    fn test_sanitize_path() {
        assert_eq!(sanitize_path("/").unwrap(), PathBuf::new());
        assert_eq!(sanitize_path("/a/./b").unwrap(), PathBuf::from("a/b"));
        assert_eq!(sanitize_path("/a%20b.txt").unwrap(), PathBuf::from("a b.txt"));
        assert_eq!(sanitize_path("/../etc/passwd"), Err(StatusCode::FORBIDDEN));
        assert_eq!(sanitize_path("/%2e%2e/secret"), Err(StatusCode::FORBIDDEN));
        assert_eq!(sanitize_path("/a%5c..%5cb"), Err(StatusCode::FORBIDDEN));
    }

    #[test]
    fn test_new_rejects_missing_root() {
        assert!(StaticFiles::new("/definitely/not/a/real/root").is_err());
    }

    #[tokio::test]
    async fn test_serves_index_for_root() {
        let (_dir, files) = fixture();
        let response = files.serve(&get("/")).await;
        assert_eq!(response.status(), 200);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "text/html"
        );
        assert_eq!(response.headers().get(CONTENT_LENGTH).unwrap(), "19");
        assert_eq!(body_string(response).await, "<h1>reSOURCERY</h1>");
    }

    #[tokio::test]
    async fn test_content_types() {
        let (_dir, files) = fixture();
        let response = files.serve(&get("/app.js")).await;
        assert_eq!(response.status(), 200);
        let content_type = response.headers().get(CONTENT_TYPE).unwrap().to_str().unwrap();
        assert!(content_type.contains("javascript"), "{content_type}");

        let response = files.serve(&get("/ffmpeg%20core.wasm")).await;
        assert_eq!(response.status(), 200);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/wasm"
        );
    }

    #[tokio::test]
    async fn test_directory_redirects_to_slash() {
        let (_dir, files) = fixture();
        let response = files.serve(&get("/docs?v=2")).await;
        assert_eq!(response.status(), 301);
        assert_eq!(response.headers().get(LOCATION).unwrap(), "/docs/?v=2");

        let response = files.serve(&get("/docs/")).await;
        assert_eq!(response.status(), 200);
        assert_eq!(body_string(response).await, "docs");
    }

    #[tokio::test]
    async fn test_directory_without_index_is_not_listed() {
        let (_dir, files) = fixture();
        let response = files.serve(&get("/empty/")).await;
        assert_eq!(response.status(), 404);
    }

    #[tokio::test]
    async fn test_missing_and_traversal() {
        let (_dir, files) = fixture();
        assert_eq!(files.serve(&get("/nope.txt")).await.status(), 404);
        assert_eq!(files.serve(&get("/app.js/child")).await.status(), 404);
        assert_eq!(files.serve(&get("/%2e%2e/etc/passwd")).await.status(), 403);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_escape_is_forbidden() {
        let (dir, files) = fixture();
        let outside = tempfile::tempdir().unwrap();
        fs::write(outside.path().join("secret.txt"), "secret").unwrap();
        std::os::unix::fs::symlink(
            outside.path().join("secret.txt"),
            dir.path().join("link.txt"),
        )
        .unwrap();
        assert_eq!(files.serve(&get("/link.txt")).await.status(), 403);
    }

    #[tokio::test]
    async fn test_head_has_length_but_no_body() {
        let (_dir, files) = fixture();
        let req = Request::head("/app.js").body(()).unwrap();
        let response = files.serve(&req).await;
        assert_eq!(response.status(), 200);
        assert_eq!(response.headers().get(CONTENT_LENGTH).unwrap(), "14");
        assert_eq!(body_string(response).await, "");
    }

    #[tokio::test]
    async fn test_unsupported_method() {
        let (_dir, files) = fixture();
        let req = Request::post("/app.js").body(()).unwrap();
        assert_eq!(files.serve(&req).await.status(), 501);
    }
}
