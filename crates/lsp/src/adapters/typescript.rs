use super::{collect_source_files, file_symbols, incoming_hierarchy, LanguageAdapter};
use crate::protocol::{LspClient, LspError, Result};
use crate::types::{CallHierarchy, SourceSymbol};
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

const EXTENSIONS: [&str; 6] = ["ts", "tsx", "js", "jsx", "mjs", "cjs"];

const SKIP_DIRS: [&str; 6] = ["node_modules", "dist", "build", ".next", "coverage", ".git"];

/// TypeScript/JavaScript adapter (typescript-language-server)
pub struct TypeScriptAdapter {
    workspace: String,
    client: LspClient,
    initialized: bool,
}

impl TypeScriptAdapter {
    pub fn new(workspace: &str) -> Self {
        Self {
            workspace: workspace.to_string(),
            client: LspClient::new(workspace),
            initialized: false,
        }
    }

    /// Locates typescript-language-server on PATH or in common prefixes
    fn find_server() -> Option<String> {
        if let Ok(output) = std::process::Command::new("which")
            .arg("typescript-language-server")
            .output()
        {
            if output.status.success() {
                return Some(String::from_utf8_lossy(&output.stdout).trim().to_string());
            }
        }

        [
            "/usr/local/bin/typescript-language-server",
            "/opt/homebrew/bin/typescript-language-server",
        ]
        .into_iter()
        .find(|p| Path::new(p).exists())
        .map(str::to_string)
    }

    fn language_id(path: &str) -> &'static str {
        match Path::new(path).extension().and_then(|e| e.to_str()) {
            Some("ts") => "typescript",
            Some("tsx") => "typescriptreact",
            Some("jsx") => "javascriptreact",
            _ => "javascript",
        }
    }
}

#[async_trait]
impl LanguageAdapter for TypeScriptAdapter {
    async fn start(&mut self) -> Result<()> {
        let server = Self::find_server()
            .ok_or_else(|| LspError::Protocol("typescript-language-server not found".into()))?;

        self.client.start(&server, &["--stdio"])?;

        tokio::time::sleep(Duration::from_secs(2)).await;
        self.client.initialize().await?;
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
            let lang_id = Self::language_id(&file_path);
            file_symbols(&mut self.client, &file_path, lang_id, &mut symbols).await?;
        }

        Ok(symbols)
    }

    fn get_source_files(&self) -> Result<Vec<String>> {
        let mut files = Vec::new();
        collect_source_files(Path::new(&self.workspace), &EXTENSIONS, &SKIP_DIRS, &mut files)?;
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
