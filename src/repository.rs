use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

pub const DEFAULT_REMOTE_URL: &str = "http://sultan.unizar.es/gasFiles";

pub const GAS_EXTENSION: &str = "gas";

static HREF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)href\s*=\s*["']([^"']+)["']"#).expect("href regex"));

/// Gas definition files: a local cache directory plus a remote archive
/// published as an HTML index page.
#[derive(Debug, Clone)]
pub struct GasRepository {
    local_dir: PathBuf,
    remote_url: String,
    client: reqwest::Client,
}

impl GasRepository {
    pub fn new(local_dir: impl Into<PathBuf>, remote_url: impl Into<String>) -> Self {
        GasRepository {
            local_dir: local_dir.into(),
            remote_url: remote_url.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn local_dir(&self) -> &Path {
        &self.local_dir
    }

    pub fn remote_url(&self) -> &str {
        &self.remote_url
    }

    /// `.gas` files in the local directory, sorted. A missing directory is
    /// an empty repository.
    pub fn list_local_files(&self) -> Result<Vec<PathBuf>> {
        let entries = match fs::read_dir(&self.local_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::io(&self.local_dir, e)),
        };

        let mut files = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| Error::io(&self.local_dir, e))?.path();
            let is_gas = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case(GAS_EXTENSION))
                .unwrap_or(false);
            if is_gas && path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// URLs of every `.gas` file linked from the remote index page.
    pub async fn list_remote_urls(&self) -> Result<Vec<String>> {
        let html = self
            .client
            .get(&self.remote_url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let urls = extract_gas_links(&html, &self.remote_url);
        debug!("{} gas links on {}", urls.len(), self.remote_url);
        Ok(urls)
    }

    /// Download every remote gas file into the local directory.
    ///
    /// All files are fetched before anything is written. Two URLs with
    /// identical content, or two URLs that would land on the same file name,
    /// abort the whole fetch.
    pub async fn fetch_all(&self) -> Result<Vec<PathBuf>> {
        let urls = self.list_remote_urls().await?;
        let mut downloads = Vec::with_capacity(urls.len());
        for url in urls {
            let bytes = self
                .client
                .get(&url)
                .send()
                .await?
                .error_for_status()?
                .bytes()
                .await?;
            debug!("fetched {url} ({} bytes)", bytes.len());
            downloads.push((url, bytes.to_vec()));
        }

        let planned = plan_writes(&downloads)?;

        fs::create_dir_all(&self.local_dir).map_err(|e| Error::io(&self.local_dir, e))?;
        let mut written = Vec::with_capacity(planned.len());
        for (name, content) in planned {
            let path = self.local_dir.join(name);
            info!("writing gas file {:?}", path);
            fs::write(&path, content).map_err(|e| Error::io(&path, e))?;
            written.push(path);
        }
        Ok(written)
    }
}

/// Absolute URLs of `.gas` links in an index page, sorted and deduplicated.
pub fn extract_gas_links(html: &str, base_url: &str) -> Vec<String> {
    let base = base_url.trim_end_matches('/');
    let mut links: Vec<String> = HREF
        .captures_iter(html)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().trim().to_string()))
        .filter(|href| {
            let keep = href
                .to_lowercase()
                .ends_with(&format!(".{GAS_EXTENSION}"));
            if !keep && href.to_lowercase().contains(GAS_EXTENSION) {
                warn!("skipping link {href}");
            }
            keep
        })
        .map(|href| {
            if href.starts_with("http://") || href.starts_with("https://") {
                href
            } else {
                format!("{base}/{}", href.trim_start_matches("./").trim_start_matches('/'))
            }
        })
        .collect();
    links.sort();
    links.dedup();
    links
}

/// Last path segment of a URL.
pub fn file_name_for(url: &str) -> Option<&str> {
    url.rsplit('/').next().filter(|name| !name.is_empty())
}

pub fn content_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

/// Map downloads to local file names, rejecting duplicate content and
/// colliding names.
pub fn plan_writes(downloads: &[(String, Vec<u8>)]) -> Result<Vec<(String, &[u8])>> {
    let mut by_hash: HashMap<String, &str> = HashMap::new();
    let mut by_name: HashMap<&str, &str> = HashMap::new();
    let mut planned = Vec::with_capacity(downloads.len());

    for (url, content) in downloads {
        let hash = content_hash(content);
        if let Some(first) = by_hash.insert(hash, url) {
            return Err(Error::DuplicateContent {
                first: first.to_string(),
                second: url.clone(),
            });
        }

        let name = file_name_for(url)
            .ok_or_else(|| Error::InvalidInput(format!("no file name in url {url}")))?;
        if let Some(first) = by_name.insert(name, url) {
            return Err(Error::NameCollision {
                name: name.to_string(),
                first: first.to_string(),
                second: url.clone(),
            });
        }
        planned.push((name.to_string(), content.as_slice()));
    }
    Ok(planned)
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX: &str = r#"<html><body>
<a href="?C=N;O=D">Name</a>
<a href="ar_co2.gas">ar_co2.gas</a>
<a href='./ne_co2.GAS'>ne_co2.GAS</a>
<a href="http://mirror.example/xe.gas">xe.gas</a>
<a href="ar_co2.gas">again</a>
<a href="notes.gas.txt">notes</a>
</body></html>"#;

    #[test]
    fn test_extract_links() {
        let links = extract_gas_links(INDEX, "http://host/gasFiles/");
        assert_eq!(
            links,
            vec![
                "http://host/gasFiles/ar_co2.gas",
                "http://host/gasFiles/ne_co2.GAS",
                "http://mirror.example/xe.gas",
            ]
        );
    }

    #[test]
    fn test_duplicate_content_rejected() {
        let downloads = vec![
            ("http://h/a.gas".to_string(), b"same".to_vec()),
            ("http://h/b.gas".to_string(), b"same".to_vec()),
        ];
        let err = plan_writes(&downloads).unwrap_err();
        assert!(matches!(err, Error::DuplicateContent { .. }));
    }

    #[test]
    fn test_name_collision_rejected() {
        let downloads = vec![
            ("http://h/a.gas".to_string(), b"one".to_vec()),
            ("http://mirror/a.gas".to_string(), b"two".to_vec()),
        ];
        let err = plan_writes(&downloads).unwrap_err();
        assert!(matches!(err, Error::NameCollision { .. }));
    }

    #[test]
    fn test_plan_distinct() {
        let downloads = vec![
            ("http://h/a.gas".to_string(), b"one".to_vec()),
            ("http://h/b.gas".to_string(), b"two".to_vec()),
        ];
        let planned = plan_writes(&downloads).unwrap();
        let names: Vec<&str> = planned.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["a.gas", "b.gas"]);
    }

    #[test]
    fn test_list_local_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.gas"), "x").unwrap();
        fs::write(dir.path().join("a.gas"), "x").unwrap();
        fs::write(dir.path().join("readme.txt"), "x").unwrap();
        fs::create_dir(dir.path().join("dir.gas")).unwrap();

        let repo = GasRepository::new(dir.path(), DEFAULT_REMOTE_URL);
        let files = repo.list_local_files().unwrap();
        assert_eq!(files, vec![dir.path().join("a.gas"), dir.path().join("b.gas")]);
    }

    #[test]
    fn test_missing_local_dir_is_empty() {
        let repo = GasRepository::new("/nonexistent/gasdrift", DEFAULT_REMOTE_URL);
        assert!(repo.list_local_files().unwrap().is_empty());
    }

    #[test]
    fn test_content_hash() {
        assert_eq!(
            content_hash(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
