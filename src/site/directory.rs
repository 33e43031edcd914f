//! Site directory providers: remote tabular query, local JSON file, and an
//! in-memory list.

use super::types::SiteLocation;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Errors fetching the site list.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid directory response: {0}")]
    InvalidResponse(String),

    #[error("Cannot read site file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No site directory configured. Use --directory-url or --sites-file")]
    NotConfigured,
}

/// Source of candidate check-in sites. Fetch-all, no paging.
pub trait SiteDirectory: Send + Sync {
    fn fetch_sites(&self) -> Result<Vec<SiteLocation>, DirectoryError>;
}

// ─── Remote directory ───────────────────────────────────────────

/// Remote site list reached over HTTP.
///
/// The backend answers with either a bare JSON array of rows or the
/// tabular envelope `{"Table": [...]}`.
pub struct HttpSiteDirectory {
    url: String,
    timeout: Duration,
}

impl HttpSiteDirectory {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: Duration::from_secs(20),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl SiteDirectory for HttpSiteDirectory {
    fn fetch_sites(&self) -> Result<Vec<SiteLocation>, DirectoryError> {
        let response = ureq::get(&self.url)
            .set("User-Agent", concat!("sitefence/", env!("CARGO_PKG_VERSION")))
            .timeout(self.timeout)
            .call()
            .map_err(|e| DirectoryError::Network(e.to_string()))?;

        let body: serde_json::Value = response
            .into_json()
            .map_err(|e| DirectoryError::InvalidResponse(e.to_string()))?;

        let sites = decode_rows(body)?;
        debug!(url = %self.url, count = sites.len(), "Fetched site directory");
        Ok(sites)
    }
}

/// Accept a bare array or a `{"Table": [...]}` envelope.
pub fn decode_rows(body: serde_json::Value) -> Result<Vec<SiteLocation>, DirectoryError> {
    let rows = match body {
        serde_json::Value::Array(rows) => serde_json::Value::Array(rows),
        serde_json::Value::Object(mut map) => map
            .remove("Table")
            .ok_or_else(|| DirectoryError::InvalidResponse("no Table field".into()))?,
        other => {
            return Err(DirectoryError::InvalidResponse(format!(
                "expected array or object, got {}",
                other
            )))
        }
    };
    serde_json::from_value(rows).map_err(|e| DirectoryError::InvalidResponse(e.to_string()))
}

// ─── Local providers ────────────────────────────────────────────

/// Site list stored as JSON on disk, same shape as the remote response.
pub struct FileSiteDirectory {
    path: PathBuf,
}

impl FileSiteDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SiteDirectory for FileSiteDirectory {
    fn fetch_sites(&self) -> Result<Vec<SiteLocation>, DirectoryError> {
        let data = std::fs::read_to_string(&self.path).map_err(|source| DirectoryError::Io {
            path: self.path.clone(),
            source,
        })?;
        let body: serde_json::Value =
            serde_json::from_str(&data).map_err(|e| DirectoryError::InvalidResponse(e.to_string()))?;
        decode_rows(body)
    }
}

/// Fixed in-memory list.
#[derive(Debug, Clone, Default)]
pub struct StaticSiteDirectory {
    sites: Vec<SiteLocation>,
}

impl StaticSiteDirectory {
    pub fn new(sites: Vec<SiteLocation>) -> Self {
        Self { sites }
    }
}

impl SiteDirectory for StaticSiteDirectory {
    fn fetch_sites(&self) -> Result<Vec<SiteLocation>, DirectoryError> {
        Ok(self.sites.clone())
    }
}

// ─── Search ─────────────────────────────────────────────────────

/// Case-insensitive substring filter over project number, project name,
/// site location and description. A blank query keeps everything.
pub fn filter_sites<'a>(sites: &'a [SiteLocation], query: &str) -> Vec<&'a SiteLocation> {
    let q = query.trim().to_lowercase();
    if q.is_empty() {
        return sites.iter().collect();
    }
    sites
        .iter()
        .filter(|s| {
            s.project_no.to_lowercase().contains(&q)
                || s.project_name.as_deref().is_some_and(|n| n.to_lowercase().contains(&q))
                || s.site_location.to_lowercase().contains(&q)
                || s.detail_description.to_lowercase().contains(&q)
        })
        .collect()
}

/// Exact project-number lookup.
pub fn find_site<'a>(sites: &'a [SiteLocation], project_no: &str) -> Option<&'a SiteLocation> {
    let wanted = project_no.trim();
    sites.iter().find(|s| s.project_no.trim() == wanted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn sample_sites() -> Vec<SiteLocation> {
        serde_json::from_value(json!([
            {"PROJECT_NO": "P-100", "PROJECT_NAME": "Alpha Tower", "SITE_LOCATION": "Downtown",
             "DETAIL_DESCRIPTION": "Main block", "coordinates": "12.97,77.59", "CHECKIN_RADIUS": 100},
            {"PROJECT_NO": "P-200", "PROJECT_NAME": null, "SITE_LOCATION": "Harbor Yard",
             "DETAIL_DESCRIPTION": "Crane bay", "GPS_LATITUDE": "13.0", "GPS_LONGITUDE": "80.2"},
            {"PROJECT_NO": "Q-300", "PROJECT_NAME": "Ridge", "SITE_LOCATION": "North",
             "DETAIL_DESCRIPTION": "Alpha annex"}
        ]))
        .unwrap()
    }

    #[test]
    fn test_filter_blank_keeps_order() {
        let sites = sample_sites();
        let hits = filter_sites(&sites, "   ");
        let nos: Vec<&str> = hits.iter().map(|s| s.project_no.as_str()).collect();
        assert_eq!(nos, vec!["P-100", "P-200", "Q-300"]);
    }

    #[test]
    fn test_filter_name_and_description() {
        let sites = sample_sites();
        let hits = filter_sites(&sites, "ALPHA");
        let nos: Vec<&str> = hits.iter().map(|s| s.project_no.as_str()).collect();
        assert_eq!(nos, vec!["P-100", "Q-300"]);
    }

    #[test]
    fn test_filter_project_no_and_site() {
        let sites = sample_sites();
        assert_eq!(filter_sites(&sites, "p-2").len(), 1);
        assert_eq!(filter_sites(&sites, "harbor")[0].project_no, "P-200");
        assert!(filter_sites(&sites, "nothing-here").is_empty());
    }

    #[test]
    fn test_find_site() {
        let sites = sample_sites();
        assert_eq!(find_site(&sites, "Q-300").unwrap().project_name.as_deref(), Some("Ridge"));
        assert!(find_site(&sites, "q-300").is_none());
    }

    #[test]
    fn test_decode_table_envelope() {
        let body = json!({"Table": [{"PROJECT_NO": "P-1"}, {"PROJECT_NO": "P-2"}]});
        let sites = decode_rows(body).unwrap();
        assert_eq!(sites.len(), 2);
        assert_eq!(sites[1].project_no, "P-2");
    }

    #[test]
    fn test_decode_rejects_scalar() {
        assert!(matches!(decode_rows(json!("oops")), Err(DirectoryError::InvalidResponse(_))));
        assert!(matches!(decode_rows(json!({"Rows": []})), Err(DirectoryError::InvalidResponse(_))));
    }

    #[test]
    fn test_file_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sites.json");
        std::fs::write(&path, serde_json::to_string(&sample_sites()).unwrap()).unwrap();

        let sites = FileSiteDirectory::new(&path).fetch_sites().unwrap();
        assert_eq!(sites, sample_sites());
    }

    #[test]
    fn test_file_directory_missing() {
        let dir = TempDir::new().unwrap();
        let result = FileSiteDirectory::new(dir.path().join("absent.json")).fetch_sites();
        assert!(matches!(result, Err(DirectoryError::Io { .. })));
    }

    #[test]
    fn test_static_directory() {
        let sites = StaticSiteDirectory::new(sample_sites()).fetch_sites().unwrap();
        assert_eq!(sites.len(), 3);
    }
}
