//! Paginated code search

use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use super::GithubClient;

/// Repository reference inside a search item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    /// `owner/name`
    pub full_name: String,
}

/// One item of a code-search response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchItem {
    /// File name
    pub name: String,

    /// Path of the file inside its repository
    pub path: String,

    /// Browser URL of the file
    pub html_url: String,

    /// API URL that returns the file's content envelope
    pub url: String,

    pub repository: Repository,
}

/// A page of code-search results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub total_count: u64,

    #[serde(default)]
    pub incomplete_results: bool,

    #[serde(default)]
    pub items: Vec<SearchItem>,
}

/// Flattened search record, the unit saved between tool runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeFile {
    pub repository: String,
    pub file_name: String,
    pub file_path: String,
    pub html_url: String,
    /// Download reference (the item's API URL)
    pub download_url: String,
}

impl From<SearchItem> for CodeFile {
    fn from(item: SearchItem) -> Self {
        CodeFile {
            repository: item.repository.full_name,
            file_name: item.name,
            file_path: item.path,
            html_url: item.html_url,
            download_url: item.url,
        }
    }
}

impl GithubClient {
    /// Request one page of search results
    ///
    /// Any failure is logged and reported as `None`.
    #[instrument(skip(self), level = "debug")]
    pub async fn search_code(&self, query: &str, per_page: u32, page: u32) -> Option<SearchResponse> {
        let params = [
            ("q", query.to_string()),
            ("per_page", per_page.to_string()),
            ("page", page.to_string()),
        ];

        match self.http.get::<SearchResponse>("search/code", &params).await {
            Ok(response) => Some(response),
            Err(e) => {
                error!("Search for {:?} page {} failed: {}", query, page, e);
                None
            }
        }
    }

    /// Fetch search results page by page, up to the configured page cap
    ///
    /// Stops early at the first failed page or the first page holding fewer
    /// than `per_page` items.
    #[instrument(skip(self))]
    pub async fn fetch_all_results(&self, query: &str, per_page: u32) -> Vec<SearchItem> {
        let mut all_results = Vec::new();

        for page in 1..=self.config.max_pages {
            info!("Fetching page {}...", page);

            let Some(results) = self.search_code(query, per_page, page).await else {
                break;
            };

            let count = results.items.len();
            all_results.extend(results.items);
            if count < per_page as usize {
                break;
            }
        }

        all_results
    }

    /// Search and flatten every result into a [`CodeFile`]
    pub async fn collect_code_files(&self, query: &str) -> Vec<CodeFile> {
        self.fetch_all_results(query, self.config.per_page)
            .await
            .into_iter()
            .map(CodeFile::from)
            .collect()
    }
}
