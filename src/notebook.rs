//! # Notebook Assembly
//!
//! Packages a module class into a deployable notebook: a fixed sequence of
//! setup cells, the class itself, an instantiation cell, an MLflow logging
//! cell and the serving-endpoint deployment cells.
//!
//! The document is written in nbformat 4.5 layout: sorted keys, one-space
//! indentation, cell sources split into lines that keep their terminators.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, instrument};

use crate::error::{Error, Result};
use crate::extract::class_name;

/// Variable the instantiated module is bound to in the notebook
pub const AGENT_VARIABLE: &str = "agent";

const INSTALL_COMMANDS: &str = "%pip install dspy pyyaml\n%pip install --upgrade --force-reinstall databricks-vectorsearch \ndbutils.library.restartPython()";

const IMPORTS: &str = r#"
import json
import requests
from pyspark.sql import Row
import yaml

from databricks.vector_search.client import VectorSearchClient

import dspy
from dspy import Databricks
from dspy.retrieve.databricks_rm import DatabricksRM
import os
import pandas as pd

import mlflow
from mlflow import MlflowClient
"#;

const LOAD_CONFIG: &str = r#"
# Load the configuration
def load_config(config_path):
    with open(config_path, "r") as file:
        config = yaml.safe_load(file)  # Use safe_load to avoid arbitrary code execution
    return config

# Access the configuration
config = load_config("config.yaml")
secrets = load_config(".secrets")

# Access the configuration values
user_path = config["user"]["path"]
catalog_name = config["database"]["catalog_name"]
schema_name = config["database"]["schema_name"]
source_table_name = config["database"]["source_table_name"]

vector_search_endpoint_name = config["vector_search"]["endpoint_name"]
vs_index = config["vector_search"]["index"]

embedding_model_endpoint = config["models"]["embedding_model_endpoint"]
llm = config["models"]["llm"]

API_TOKEN = secrets["auth"]["api_token"]

registered_model_name = config["registered"]["model_name"]
registered_endpoint_name = config["registered"]["endpoint_name"]

API_ROOT = dbutils.notebook.entry_point.getDbutils().notebook().getContext().apiUrl().get()
"#;

const ENDPOINT_CONFIG_SETUP: &str = r#"
# Set the name of the MLflow endpoint
endpoint_name = registered_endpoint_name

# Name of the registered MLflow model
model_name = registered_model_name

# Get the latest version of the MLflow model
mlflow_client = MlflowClient()
model_version = mlflow_client.search_model_versions(filter_string=f"name='{registered_model_name}'")[0].version

# Specify the type of compute (CPU, GPU_SMALL, GPU_LARGE, etc.)
workload_type = "CPU_SMALL"

# Specify the scale-out size of compute (Small, Medium, Large, etc.)
workload_size = "Small"

# Specify Scale to Zero(only supported for CPU endpoints)
scale_to_zero = False

# Get the API endpoint and token for the current notebook context
serving_host = spark.conf.get("spark.databricks.workspaceUrl")
"#;

const DEPLOY_TO_ENDPOINT: &str = r#"
# Deploy the model to a model serving endpoint in Databricks
data = {
    "name": endpoint_name,
    "served_entities": [
        {
            "entity_name": registered_model_name,
            "entity_version": model_version,
            "workload_size": workload_size,
            "scale_to_zero_enabled": scale_to_zero,
            "workload_type": workload_type,
            "environment_vars": {
                "DATABRICKS_TOKEN": f"{API_TOKEN}",
                "DATABRICKS_HOST": f"{API_ROOT}"
            }
        }
    ]
}

headers = {"Context-Type": "text/json", "Authorization": f"Bearer {API_TOKEN}"}

url = f"https://{serving_host}/api/2.0/serving-endpoints/{endpoint_name}/config"

response = requests.put(
    url=url, json=data, headers=headers
)

print(json.dumps(response.json(), indent=4))
"#;

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\W\d]\w*$").expect("identifier pattern is valid"));

/// A code cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub cell_type: String,
    pub execution_count: Option<u64>,
    pub id: String,
    pub metadata: Map<String, Value>,
    pub outputs: Vec<Value>,
    pub source: Vec<String>,
}

impl Cell {
    /// A fresh, unexecuted code cell
    pub fn code(source: &str) -> Self {
        let id = uuid::Uuid::new_v4().simple().to_string();
        Self {
            cell_type: "code".to_string(),
            execution_count: None,
            id: id[..8].to_string(),
            metadata: Map::new(),
            outputs: Vec::new(),
            source: source.split_inclusive('\n').map(str::to_string).collect(),
        }
    }

    /// The cell source joined back into one string
    pub fn source_text(&self) -> String {
        self.source.concat()
    }
}

/// A notebook document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notebook {
    pub cells: Vec<Cell>,
    pub metadata: Map<String, Value>,
    pub nbformat: u32,
    pub nbformat_minor: u32,
}

impl Default for Notebook {
    fn default() -> Self {
        Self::new()
    }
}

impl Notebook {
    /// An empty nbformat 4.5 notebook
    pub fn new() -> Self {
        Self {
            cells: Vec::new(),
            metadata: Map::new(),
            nbformat: 4,
            nbformat_minor: 5,
        }
    }

    /// Append a code cell
    pub fn push_code_cell(&mut self, source: &str) {
        self.cells.push(Cell::code(source));
    }

    /// Serialize with one-space indentation and a trailing newline
    pub fn to_json_string(&self) -> Result<String> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b" ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut serializer)?;
        buf.push(b'\n');
        String::from_utf8(buf).map_err(Error::from)
    }

    /// Write the notebook to `path`
    pub fn write(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json_string()?)?;
        Ok(())
    }

    /// Read a notebook from `path`
    pub fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Quote text as a double-quoted Python string body
fn python_string_body(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out
}

fn log_model_cell(user_message: &str) -> String {
    format!(
        "with mlflow.start_run():\n    # Log the model\n    model_info = mlflow.dspy.log_model(\n        dspy_model={},\n        registered_model_name=registered_model_name,\n        artifact_path=\"model\",\n        input_example=\"{}\",\n        pip_requirements=[\"dspy\"]\n    )",
        AGENT_VARIABLE,
        python_string_body(user_message)
    )
}

/// Assemble the deployment notebook for a module class
pub fn build_notebook(user_message: &str, class_def: &str, class_name: &str) -> Notebook {
    let mut nb = Notebook::new();
    nb.push_code_cell(INSTALL_COMMANDS);
    nb.push_code_cell(IMPORTS);
    nb.push_code_cell(LOAD_CONFIG);
    nb.push_code_cell(class_def);
    nb.push_code_cell(&format!("{} = {}()", AGENT_VARIABLE, class_name));
    nb.push_code_cell(&log_model_cell(user_message));
    nb.push_code_cell(ENDPOINT_CONFIG_SETUP);
    nb.push_code_cell(DEPLOY_TO_ENDPOINT);
    nb
}

/// Write `<save_dir>/<class_name>_notebook.ipynb` and return its path
#[instrument(skip(user_message, class_def))]
pub fn make_notebook(user_message: &str, class_def: &str, class_name: &str, save_dir: &Path) -> Result<PathBuf> {
    if !IDENTIFIER.is_match(class_name) {
        return Err(Error::Config(format!("{:?} is not a valid class name", class_name)));
    }

    std::fs::create_dir_all(save_dir)?;
    let full_path = save_dir.join(format!("{}_notebook.ipynb", class_name));

    build_notebook(user_message, class_def, class_name).write(&full_path)?;
    info!("Notebook saved to {}", full_path.display());
    Ok(full_path)
}

/// The body of a single code fence wrapping the whole text, or the text itself
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return text;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return text;
    };
    // first line is the info string, e.g. `python`
    match body.split_once('\n') {
        Some((_, code)) if !code.contains("```") => code,
        _ => text,
    }
}

/// Like [`make_notebook`], taking the class name from the definition's header
///
/// A definition wrapped in one markdown code fence is unwrapped first.
pub fn make_notebook_for_module(user_message: &str, class_def: &str, save_dir: &Path) -> Result<PathBuf> {
    let class_def = strip_code_fence(class_def);
    let name = class_name(class_def.trim_start())
        .ok_or_else(|| Error::Config("no class definition found".to_string()))?;
    make_notebook(user_message, class_def, &name, save_dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLASS_DEF: &str = "class RAG(dspy.Module):\n    def forward(self, q):\n        return q\n";

    #[test]
    fn test_cell_source_lines() {
        let cell = Cell::code("a\nb\n\nc");
        assert_eq!(cell.source, vec!["a\n", "b\n", "\n", "c"]);
        assert_eq!(cell.source_text(), "a\nb\n\nc");
        assert_eq!(cell.id.len(), 8);
        assert!(Cell::code("").source.is_empty());
    }

    #[test]
    fn test_cell_order() {
        let nb = build_notebook("What is DSPy?", CLASS_DEF, "RAG");
        assert_eq!(nb.cells.len(), 8);
        assert!(nb.cells[0].source_text().starts_with("%pip install dspy pyyaml"));
        assert!(nb.cells[1].source_text().contains("import dspy\n"));
        assert!(nb.cells[2].source_text().contains("def load_config(config_path):"));
        assert_eq!(nb.cells[3].source_text(), CLASS_DEF);
        assert_eq!(nb.cells[4].source_text(), "agent = RAG()");
        assert!(nb.cells[5].source_text().contains("dspy_model=agent,"));
        assert!(nb.cells[5].source_text().contains("input_example=\"What is DSPy?\","));
        assert!(nb.cells[6].source_text().contains("workload_type = \"CPU_SMALL\""));
        assert!(nb.cells[7].source_text().contains("requests.put("));
    }

    #[test]
    fn test_input_example_is_escaped() {
        let nb = build_notebook("say \"hi\"\nthen \\ leave", CLASS_DEF, "RAG");
        assert!(nb.cells[5]
            .source_text()
            .contains(r#"input_example="say \"hi\"\nthen \\ leave","#));
    }

    #[test]
    fn test_document_layout() {
        let json = build_notebook("q", CLASS_DEF, "RAG").to_json_string().unwrap();
        assert!(json.starts_with("{\n \"cells\": [\n  {\n   \"cell_type\": \"code\",\n   \"execution_count\": null,"));
        assert!(json.ends_with(" \"metadata\": {},\n \"nbformat\": 4,\n \"nbformat_minor\": 5\n}\n"));
    }

    #[test]
    fn test_make_notebook_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let save_dir = dir.path().join("notebooks");
        let path = make_notebook("q", CLASS_DEF, "RAG", &save_dir).unwrap();
        assert_eq!(path, save_dir.join("RAG_notebook.ipynb"));

        let nb = Notebook::read(&path).unwrap();
        assert_eq!(nb.nbformat, 4);
        assert_eq!(nb.cells[3].source_text(), CLASS_DEF);
    }

    #[test]
    fn test_make_notebook_for_module() {
        let dir = tempfile::tempdir().unwrap();
        let path = make_notebook_for_module("q", CLASS_DEF, dir.path()).unwrap();
        assert!(path.ends_with("RAG_notebook.ipynb"));

        let missing = make_notebook_for_module("q", "def f(): pass", dir.path());
        assert!(matches!(missing, Err(Error::Config(_))));
    }

    #[test]
    fn test_load_config_cell() {
        let nb = build_notebook("q", CLASS_DEF, "RAG");
        let cell = nb.cells[2].source_text();
        assert!(cell.starts_with("\n# Load the configuration\ndef load_config(config_path):\n"));
        assert!(cell.contains(
            "        config = yaml.safe_load(file)  # Use safe_load to avoid arbitrary code execution\n    return config\n\n# Access the configuration\nconfig = load_config(\"config.yaml\")\n"
        ));
        assert!(cell.contains("secrets = load_config(\".secrets\")\n\n# Access the configuration values\nuser_path = config[\"user\"][\"path\"]\n"));
        assert!(cell.contains("API_TOKEN = secrets[\"auth\"][\"api_token\"]\n"));
        assert!(cell.ends_with(".apiUrl().get()\n"));
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```python\nclass A:\n    pass\n```\n"), "class A:\n    pass\n");
        assert_eq!(strip_code_fence("```\nx = 1```"), "x = 1");
        assert_eq!(strip_code_fence(CLASS_DEF), CLASS_DEF);
        // prose around the fence, or several fences, are left alone
        let mixed = "Here:\n```python\nclass A: pass\n```";
        assert_eq!(strip_code_fence(mixed), mixed);
        let two = "```\na\n```\n```\nb\n```";
        assert_eq!(strip_code_fence(two), two);
    }

    #[test]
    fn test_make_notebook_for_fenced_reply() {
        let dir = tempfile::tempdir().unwrap();
        let reply = format!("```python\n{}```", CLASS_DEF);
        let path = make_notebook_for_module("q", &reply, dir.path()).unwrap();
        assert!(path.ends_with("RAG_notebook.ipynb"));

        let nb = Notebook::read(&path).unwrap();
        assert_eq!(nb.cells[3].source_text(), CLASS_DEF);
    }

    #[test]
    fn test_rejects_unsafe_class_name() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["../evil", "", "9lives", "a b"] {
            assert!(matches!(
                make_notebook("q", CLASS_DEF, name, dir.path()),
                Err(Error::Config(_))
            ));
        }
    }
}
