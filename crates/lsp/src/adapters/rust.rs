use super::{collect_source_files, file_symbols, incoming_hierarchy, LanguageAdapter};
use crate::protocol::{LspClient, LspError, Result};
use crate::types::{CallHierarchy, SourceSymbol};
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

/// Rust adapter (rust-analyzer)
pub struct RustAdapter {
    workspace: String,
    client: LspClient,
    initialized: bool,
}

impl RustAdapter {
    pub fn new(workspace: &str) -> Self {
        Self {
            workspace: workspace.to_string(),
            client: LspClient::new(workspace),
            initialized: false,
        }
    }
}

#[async_trait]
impl LanguageAdapter for RustAdapter {
    async fn start(&mut self) -> Result<()> {
        self.client.start("rust-analyzer", &[])?;

        tokio::time::sleep(Duration::from_secs(2)).await;
        self.client.initialize().await?;

        // give the server time to index the workspace
        tokio::time::sleep(Duration::from_secs(3)).await;

        self.initialized = true;
        Ok(())
    }

    async fn get_symbols(&mut self) -> Result<Vec<SourceSymbol>> {
        if !self.initialized {
            return Err(LspError::NotStarted);
        }

        let mut symbols = Vec::new();
        for file_path in self.get_source_files()? {
            file_symbols(&mut self.client, &file_path, "rust", &mut symbols).await?;
        }

        Ok(symbols)
    }

    fn get_source_files(&self) -> Result<Vec<String>> {
        let mut files = Vec::new();
        collect_source_files(Path::new(&self.workspace), &["rs"], &["target", ".git"], &mut files)?;
        Ok(files)
    }

    async fn get_call_hierarchy(&mut self, symbol: &SourceSymbol) -> Result<CallHierarchy> {
        incoming_hierarchy(&mut self.client, symbol).await
    }

    fn workspace(&self) -> &str {
        &self.workspace
    }

    fn stop(&mut self) -> Result<()> {
        self.client.shutdown()
    }
}
