//! # Archive Drivers
//!
//! The search, extraction and tabulation steps as standalone operations over
//! JSON files, plus `run`, which chains all three in memory.
//!
//! ## File formats
//!
//! - search output: JSON array of [`CodeFile`]
//! - extraction output: JSON array of [`ModuleFile`]
//! - tabulation output: CSV, see [`crate::table`]
//!
//! JSON is written with four-space indentation.

use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{info, instrument, warn};

use crate::error::Result;
use crate::extract::ModulePattern;
use crate::github::{CodeFile, GithubClient, decode_content};
use crate::table::{ModuleFile, make_rows, write_csv};

/// Search and save the flattened results as JSON
#[instrument(skip(client))]
pub async fn save_search_results(client: &GithubClient, query: &str, output_file: &Path) -> Result<PathBuf> {
    let files = client.collect_code_files(query).await;
    write_json(output_file, &files)?;
    info!("Results saved to {}", output_file.display());
    Ok(output_file.to_path_buf())
}

/// Download each file and keep those containing at least one module
///
/// Files that cannot be downloaded or decoded are skipped.
#[instrument(skip(client, files, pattern), fields(files = files.len()))]
pub async fn extract_modules(client: &GithubClient, files: &[CodeFile], pattern: &ModulePattern) -> Vec<ModuleFile> {
    let progress = ProgressBar::new(files.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("Processing files [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-"),
    );

    let mut module_files = Vec::new();

    for file in files {
        progress.inc(1);

        let Some(envelope) = client.download_file(&file.download_url).await else {
            continue;
        };

        let code_text = match decode_content(&envelope) {
            Ok(text) => text,
            Err(e) => {
                warn!("Skipping {}/{}: {}", file.repository, file.file_path, e);
                continue;
            }
        };

        let modules = pattern.find_modules(&code_text);
        if !modules.is_empty() {
            module_files.push(ModuleFile {
                repository: file.repository.clone(),
                file_name: file.file_name.clone(),
                file_path: file.file_path.clone(),
                html_url: file.html_url.clone(),
                modules,
            });
        }
    }

    progress.finish_and_clear();
    info!("Found modules in {} of {} files", module_files.len(), files.len());
    module_files
}

/// Extract modules from the files listed in a saved search
#[instrument(skip(client, pattern))]
pub async fn extract_modules_from_file(
    client: &GithubClient,
    input_file: &Path,
    output_file: &Path,
    pattern: &ModulePattern,
) -> Result<PathBuf> {
    let files: Vec<CodeFile> = read_json(input_file)?;
    let module_files = extract_modules(client, &files, pattern).await;
    write_json(output_file, &module_files)?;
    info!("Results saved to {}", output_file.display());
    Ok(output_file.to_path_buf())
}

/// Turn saved extraction output into a CSV table
#[instrument]
pub fn tabulate_file(input_file: &Path, output_file: &Path) -> Result<PathBuf> {
    let module_files: Vec<ModuleFile> = read_json(input_file)?;
    write_csv(output_file, &make_rows(&module_files))?;
    Ok(output_file.to_path_buf())
}

/// Search, extract and tabulate in one pass without intermediate files
#[instrument(skip(client, pattern))]
pub async fn run(client: &GithubClient, query: &str, output_file: &Path, pattern: &ModulePattern) -> Result<PathBuf> {
    let files = client.collect_code_files(query).await;
    info!("Search returned {} files", files.len());
    let module_files = extract_modules(client, &files, pattern).await;
    write_csv(output_file, &make_rows(&module_files))?;
    Ok(output_file.to_path_buf())
}

/// Read a JSON document from a file
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Write a value as four-space indented JSON, creating parent directories
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut serializer)?;
    std::fs::write(path, buf)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::GithubConfig;
    use base64::Engine;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn client(url: String) -> GithubClient {
        GithubClient::new(
            GithubConfig::builder()
                .api_base_url(url)
                .token("test-token")
                .request_interval_ms(0)
                .rate_limit_delay_secs(0)
                .build(),
        )
        .unwrap()
    }

    fn encoded(text: &str) -> String {
        base64::engine::general_purpose::STANDARD.encode(text)
    }

    fn code_file(base: &str, name: &str) -> CodeFile {
        CodeFile {
            repository: "o/r".to_string(),
            file_name: name.to_string(),
            file_path: format!("src/{}", name),
            html_url: format!("https://github.com/o/r/blob/main/src/{}", name),
            download_url: format!("{}/repositories/1/contents/src/{}", base, name),
        }
    }

    async fn mock_file(server: &mut Server, name: &str, text: &str) -> mockito::Mock {
        server
            .mock("GET", format!("/repositories/1/contents/src/{}", name).as_str())
            .with_status(200)
            .with_body(json!({ "name": name, "encoding": "base64", "content": encoded(text) }).to_string())
            .create_async()
            .await
    }

    #[tokio::test]
    async fn test_extract_modules_keeps_matching_files() {
        let mut server = Server::new_async().await;
        let base = server.url();
        let _a = mock_file(&mut server, "a.py", "class A(dspy.Module):\n    pass\n").await;
        let _b = mock_file(&mut server, "b.py", "def helper():\n    pass\n").await;
        let _c = server
            .mock("GET", "/repositories/1/contents/src/c.py")
            .with_status(404)
            .create_async()
            .await;
        let _d = server
            .mock("GET", "/repositories/1/contents/src/d.py")
            .with_status(200)
            .with_body("{\"name\": \"d.py\"}")
            .create_async()
            .await;

        let files: Vec<CodeFile> = ["a.py", "b.py", "c.py", "d.py"]
            .iter()
            .map(|n| code_file(&base, n))
            .collect();

        let found = extract_modules(&client(base.clone()), &files, &ModulePattern::default()).await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].file_name, "a.py");
        assert_eq!(found[0].modules, vec!["class A(dspy.Module):\n    pass\n"]);
    }

    #[tokio::test]
    async fn test_file_stages_chain() {
        let mut server = Server::new_async().await;
        let base = server.url();
        let _search = server
            .mock("GET", "/search/code")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                json!({
                    "total_count": 1,
                    "items": [{
                        "name": "a.py",
                        "path": "src/a.py",
                        "html_url": "https://github.com/o/r/blob/main/src/a.py",
                        "url": format!("{}/repositories/1/contents/src/a.py", base),
                        "repository": { "full_name": "o/r" }
                    }]
                })
                .to_string(),
            )
            .create_async()
            .await;
        let _a = mock_file(&mut server, "a.py", "class A(dspy.Module):\n    # note\n    pass\n").await;

        let dir = tempfile::tempdir().unwrap();
        let search_json = dir.path().join("archive/snippets.json");
        let modules_json = dir.path().join("archive/modules.json");
        let table = dir.path().join("archive/modules.csv");
        let client = client(base);

        save_search_results(&client, "dspy.Module", &search_json).await.unwrap();
        let saved: Vec<CodeFile> = read_json(&search_json).unwrap();
        assert_eq!(saved.len(), 1);
        assert!(std::fs::read_to_string(&search_json).unwrap().contains("\n        \"repository\""));

        extract_modules_from_file(&client, &search_json, &modules_json, &ModulePattern::default())
            .await
            .unwrap();
        let module_files: Vec<ModuleFile> = read_json(&modules_json).unwrap();
        assert_eq!(module_files[0].modules.len(), 1);

        tabulate_file(&modules_json, &table).unwrap();
        let mut reader = csv::Reader::from_path(&table).unwrap();
        let record = reader.records().next().unwrap().unwrap();
        assert_eq!(&record[0], "o/r");
        assert_eq!(&record[6], "[\"# note\"]");
    }

    #[tokio::test]
    async fn test_run_without_results_writes_header() {
        let mut server = Server::new_async().await;
        let _search = server
            .mock("GET", "/search/code")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("{\"total_count\": 0, \"items\": []}")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let table = dir.path().join("modules.csv");
        run(&client(server.url()), "nothing", &table, &ModulePattern::default())
            .await
            .unwrap();

        let text = std::fs::read_to_string(&table).unwrap();
        assert!(text.starts_with("repository,file_name"));
        assert_eq!(text.lines().count(), 1);
    }
}
