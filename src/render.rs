//! Result document rendering.
//!
//! The create command produces an [`OutputDocument`]. By default it is dumped
//! as YAML; with `--template` it is rendered through a Tera template that
//! sees the same fields (`endpoint`, `scheme`, `host`, `port`, `users`).

use crate::config::Endpoint;
use provision::AccountResult;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tera::{Context, Tera};
use thiserror::Error;

const TEMPLATE_NAME: &str = "output";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("read template {path}: {source}")]
    ReadTemplate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("template: {0}")]
    Template(#[from] tera::Error),

    #[error("serialize output: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("write output {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Everything a create run reports.
#[derive(Debug, Clone, Serialize)]
pub struct OutputDocument {
    pub endpoint: String,
    pub scheme: String,
    pub host: String,
    pub port: u16,
    pub users: Vec<AccountResult>,
}

impl OutputDocument {
    pub fn new(endpoint: &Endpoint, users: Vec<AccountResult>) -> Self {
        Self {
            endpoint: endpoint.endpoint.clone(),
            scheme: endpoint.scheme.clone(),
            host: endpoint.host.clone(),
            port: endpoint.port,
            users,
        }
    }

    pub fn to_yaml(&self) -> Result<String, RenderError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Render through a template given as text.
    pub fn render_str(&self, template: &str) -> Result<String, RenderError> {
        let mut tera = Tera::default();
        tera.add_raw_template(TEMPLATE_NAME, template)?;
        let context = Context::from_serialize(self)?;
        Ok(tera.render(TEMPLATE_NAME, &context)?)
    }

    /// YAML, or the template at `template` when given.
    pub fn render(&self, template: Option<&Path>) -> Result<String, RenderError> {
        let Some(path) = template else {
            return self.to_yaml();
        };
        let text = fs::read_to_string(path).map_err(|source| RenderError::ReadTemplate {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("rendering output through template {}", path.display());
        self.render_str(&text)
    }
}

pub fn write_output(path: &Path, content: &str) -> Result<(), RenderError> {
    fs::write(path, content).map_err(|source| RenderError::Write {
        path: path.to_path_buf(),
        source,
    })
}
