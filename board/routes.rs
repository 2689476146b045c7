use std::io::Cursor;
use std::path::Path;

use tiny_http::{Header, Method, Request, Response, StatusCode};

use ferrite_captcha::logger::experiment::{read_scalars, FIGURES_DIR};

use crate::render;

/// A response before it is bound to a tiny_http request.
#[derive(Debug)]
pub struct Reply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl Reply {
    fn ok(content_type: &'static str, body: Vec<u8>) -> Self {
        Reply { status: 200, content_type, body }
    }

    fn not_found() -> Self {
        Reply { status: 404, content_type: "text/plain", body: b"404 Not Found".to_vec() }
    }

    fn error(message: String) -> Self {
        Reply { status: 500, content_type: "text/plain; charset=utf-8", body: message.into_bytes() }
    }

    fn into_response(self) -> Response<Cursor<Vec<u8>>> {
        let len = self.body.len();
        let headers = Header::from_bytes(&b"Content-Type"[..], self.content_type.as_bytes())
            .into_iter()
            .collect();
        Response::new(StatusCode(self.status), headers, Cursor::new(self.body), Some(len), None)
    }
}

/// A figure file name is served only if it names a plain PNG in `figures/`.
fn is_figure_name(name: &str) -> bool {
    !name.is_empty()
        && name.ends_with(".png")
        && !name.contains('/')
        && !name.contains('\\')
        && !name.starts_with('.')
}

/// Resolves a GET path against the run directory.
pub fn route(path: &str, run_dir: &Path) -> Reply {
    match path {
        "/" => match render::index_page(run_dir) {
            Ok(html) => Reply::ok("text/html; charset=utf-8", html.into_bytes()),
            Err(e) => Reply::error(format!("failed to read {}: {e}", run_dir.display())),
        },
        "/scalars.json" => {
            let entries = read_scalars(run_dir).unwrap_or_default();
            match serde_json::to_vec(&entries) {
                Ok(body) => Reply::ok("application/json", body),
                Err(e) => Reply::error(e.to_string()),
            }
        }
        _ => match path.strip_prefix("/figures/") {
            Some(name) if is_figure_name(name) => {
                match std::fs::read(run_dir.join(FIGURES_DIR).join(name)) {
                    Ok(bytes) => Reply::ok("image/png", bytes),
                    Err(_) => Reply::not_found(),
                }
            }
            _ => Reply::not_found(),
        },
    }
}

pub fn dispatch(request: Request, run_dir: &Path) {
    let url = request.url().to_owned();
    let path = url.split('?').next().unwrap_or("/");

    let reply = if *request.method() == Method::Get {
        route(path, run_dir)
    } else {
        Reply { status: 405, content_type: "text/plain", body: b"405 Method Not Allowed".to_vec() }
    };
    log::debug!("{} {} -> {}", request.method(), url, reply.status);

    if let Err(e) = request.respond(reply.into_response()) {
        log::warn!("Failed to respond to {url}: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrite_captcha::logger::experiment::{Experiment, RunDirectory};
    use image::RgbImage;

    fn run_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let mut exp = RunDirectory::create(dir.path()).unwrap();
        exp.add_scalar("val/total_loss", 0.75, 3).unwrap();
        exp.add_scalar("val/total_loss", 0.5, 6).unwrap();
        exp.add_figure("Predicted_Images", &RgbImage::new(4, 4), 6).unwrap();
        exp.flush().unwrap();
        dir
    }

    #[test]
    fn test_scalars_json_lists_every_entry() {
        let dir = run_dir();
        let reply = route("/scalars.json", dir.path());
        assert_eq!(reply.status, 200);
        let entries: Vec<serde_json::Value> = serde_json::from_slice(&reply.body).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1]["value"], 0.5);
    }

    #[test]
    fn test_index_shows_latest_value_and_figures() {
        let dir = run_dir();
        let reply = route("/", dir.path());
        let html = String::from_utf8(reply.body).unwrap();
        assert!(html.contains("val/total_loss"));
        assert!(html.contains("0.5000"));
        assert!(html.contains("/figures/Predicted_Images_000006.png"));
    }

    #[test]
    fn test_figures_are_served_and_traversal_is_rejected() {
        let dir = run_dir();
        let reply = route("/figures/Predicted_Images_000006.png", dir.path());
        assert_eq!((reply.status, reply.content_type), (200, "image/png"));
        assert_eq!(route("/figures/../scalars.jsonl", dir.path()).status, 404);
        assert_eq!(route("/figures/missing.png", dir.path()).status, 404);
        assert_eq!(route("/nope", dir.path()).status, 404);
    }
}
