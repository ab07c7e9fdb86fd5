use std::path::{Component, Path, PathBuf};

use log::debug;

/// Read-only view of a directory served to authenticated GETs.
#[derive(Debug, Clone)]
pub struct StaticFiles {
    root: PathBuf,
}

impl StaticFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Map a request path to a file beneath the root.
    ///
    /// Query strings are dropped and `/` maps to `index.html`. Any `..`,
    /// absolute or prefix component yields `None`.
    pub fn resolve(&self, url: &str) -> Option<PathBuf> {
        let path = url.split(['?', '#']).next().unwrap_or("");
        let relative = path.trim_start_matches('/');
        let relative = if relative.is_empty() || relative.ends_with('/') {
            format!("{relative}index.html")
        } else {
            relative.to_string()
        };

        let mut resolved = self.root.clone();
        for component in Path::new(&relative).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    debug!("Refusing path outside static root: {}", url);
                    return None;
                }
            }
        }
        Some(resolved)
    }

    /// Contents and content type for `url`, if it names a regular file.
    pub async fn read(&self, url: &str) -> Option<(Vec<u8>, &'static str)> {
        let path = self.resolve(url)?;
        let meta = tokio::fs::metadata(&path).await.ok()?;
        if !meta.is_file() {
            return None;
        }
        let data = tokio::fs::read(&path).await.ok()?;
        Some((data, content_type(&path)))
    }
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html") | Some("htm") => "text/html; charset=utf-8",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn root_maps_to_index() {
        let files = StaticFiles::new("/srv/arcom");
        assert_eq!(
            files.resolve("/"),
            Some(PathBuf::from("/srv/arcom/index.html"))
        );
        assert_eq!(
            files.resolve("/help/?x=1"),
            Some(PathBuf::from("/srv/arcom/help/index.html"))
        );
        assert_eq!(
            files.resolve("/app.js"),
            Some(PathBuf::from("/srv/arcom/app.js"))
        );
    }

    #[test]
    fn traversal_is_refused() {
        let files = StaticFiles::new("/srv/arcom");
        assert_eq!(files.resolve("/../etc/passwd"), None);
        assert_eq!(files.resolve("/css/../../secret"), None);
    }

    #[tokio::test]
    async fn reads_files_with_content_type() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>RC210</h1>").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let files = StaticFiles::new(dir.path());
        let (data, kind) = files.read("/").await.unwrap();
        assert_eq!(data, b"<h1>RC210</h1>");
        assert_eq!(kind, "text/html; charset=utf-8");
        assert!(files.read("/missing.css").await.is_none());
        assert!(files.read("/sub").await.is_none());
    }
}
