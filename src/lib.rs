//! # dspy-archive - Mining LLM Module Code from Public Repositories
//!
//! This crate gathers `dspy.Module` class definitions published in public
//! repositories and turns them into a table for analysis. It also offers a
//! terminal chat against a model endpoint that generates new modules, and
//! packages a module into a deployment notebook.
//!
//! ## Features
//!
//! - Paginated code search with a fixed page cap and request pacing
//! - Content download with a fixed-delay retry on rate limiting
//! - Regex extraction of module classes and their comments
//! - CSV tabulation with derived length and comment columns
//! - Chat client for hosted inference endpoints
//! - nbformat 4.5 notebook assembly
//!
//! ## Example
//!
//! ```rust,no_run
//! use dspy_archive::extract::ModulePattern;
//! use dspy_archive::github::{GithubClient, GithubConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GithubConfig::builder().token("ghp_...").max_pages(2).build();
//!     let client = GithubClient::new(config)?;
//!
//!     let files = client.collect_code_files("dspy.Module language:python").await;
//!     let modules = dspy_archive::archive::extract_modules(&client, &files, &ModulePattern::default()).await;
//!     let rows = dspy_archive::table::make_rows(&modules);
//!     dspy_archive::table::write_csv("modules.csv".as_ref(), &rows)?;
//!     Ok(())
//! }
//! ```

mod error;

pub mod archive;
pub mod chat;
pub mod extract;
pub mod github;
pub mod notebook;
pub mod secrets;
pub mod table;

pub use error::Error;

/// Re-export of common types for public use
pub mod prelude {
    pub use crate::error::Error;
    pub use crate::error::Result;
}
