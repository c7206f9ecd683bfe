//! render / analyze subcommands

use anyhow::Context;
use clap::{Args, ValueEnum};
use diagram::{
    collect_snapshot, load_snapshot, save_snapshot, AnalysisSnapshot, DotRenderer, GraphBuilder, GraphvizLayout,
    ImageFormat, CELL_HREF_PREFIX,
};
use lsp::{LanguageAdapter, RustAdapter, TypeScriptAdapter};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Lang {
    Rust,
    #[value(alias = "typescript")]
    Ts,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Dot,
    Svg,
    Png,
    Pdf,
    Html,
    /// The built graph model
    Json,
}

#[derive(Args)]
pub struct RenderArgs {
    /// Project path (ignored with --snapshot)
    path: Option<String>,
    /// Render a saved snapshot instead of analyzing
    #[arg(long, conflicts_with = "path")]
    snapshot: Option<PathBuf>,
    /// Language (rust, typescript/ts)
    #[arg(short, long, value_enum, default_value = "rust")]
    lang: Lang,
    #[arg(short, long, value_enum, default_value = "dot")]
    format: OutputFormat,
    /// Output file (stdout if omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Graphviz program used for image formats
    #[arg(long, default_value = "dot")]
    layout_cmd: String,
}

#[derive(Args)]
pub struct AnalyzeArgs {
    /// Project path
    path: String,
    /// Language (rust, typescript/ts)
    #[arg(short, long, value_enum, default_value = "rust")]
    lang: Lang,
    /// Output file (stdout if omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

pub async fn render(args: RenderArgs) -> anyhow::Result<()> {
    let snapshot = match (&args.snapshot, &args.path) {
        (Some(file), _) => load_snapshot(file)?,
        (None, Some(path)) => analyze_project(path, args.lang).await?,
        (None, None) => anyhow::bail!("Either a project path or --snapshot is required"),
    };

    let graph = GraphBuilder::new().build(&snapshot)?;
    let renderer = DotRenderer::new();
    let layout = GraphvizLayout::new().with_program(&args.layout_cmd);

    let bytes = match args.format {
        OutputFormat::Json => serde_json::to_vec_pretty(&graph)?,
        OutputFormat::Dot => renderer.render(&graph)?.into_bytes(),
        OutputFormat::Svg => layout.with_format(ImageFormat::Svg).render(&renderer.render(&graph)?)?,
        OutputFormat::Png => layout.with_format(ImageFormat::Png).render(&renderer.render(&graph)?)?,
        OutputFormat::Pdf => layout.with_format(ImageFormat::Pdf).render(&renderer.render(&graph)?)?,
        OutputFormat::Html => {
            let svg = layout.with_format(ImageFormat::Svg).render_text(&renderer.render(&graph)?)?;
            html_page(&svg).into_bytes()
        }
    };

    write_output(args.output.as_deref(), &bytes)
}

pub async fn analyze(args: AnalyzeArgs) -> anyhow::Result<()> {
    let snapshot = analyze_project(&args.path, args.lang).await?;

    match args.output {
        Some(file) => {
            save_snapshot(&snapshot, &file)?;
            info!(file = %file.display(), "saved snapshot");
        }
        None => println!("{}", serde_json::to_string_pretty(&snapshot)?),
    }

    Ok(())
}

async fn analyze_project(path: &str, lang: Lang) -> anyhow::Result<AnalysisSnapshot> {
    let project_path = PathBuf::from(path)
        .canonicalize()
        .with_context(|| format!("Project not found: {}", path))?;
    let workspace = project_path
        .to_str()
        .with_context(|| format!("Project path is not valid UTF-8: {}", project_path.display()))?;
    info!(project = workspace, ?lang, "analyzing");

    match lang {
        Lang::Rust => collect_with(RustAdapter::new(workspace)).await,
        Lang::Ts => collect_with(TypeScriptAdapter::new(workspace)).await,
    }
}

async fn collect_with<A: LanguageAdapter>(mut adapter: A) -> anyhow::Result<AnalysisSnapshot> {
    adapter.start().await?;
    let snapshot = collect_snapshot(&mut adapter).await;
    adapter.stop()?;
    Ok(snapshot?)
}

fn write_output(output: Option<&Path>, bytes: &[u8]) -> anyhow::Result<()> {
    match output {
        Some(file) => {
            std::fs::write(file, bytes).with_context(|| format!("Failed to write {}", file.display()))?;
            info!(file = %file.display(), bytes = bytes.len(), "saved");
        }
        None => {
            use std::io::Write;
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(bytes)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

/// Standalone page around the SVG. The script turns row links into CSS
/// classes on the row group.
fn html_page(svg: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>callmap</title>
<style>
body {{ margin: 0; font-family: helvetica, sans-serif; }}
.closure text {{ font-style: italic; }}
.type text, .interface text {{ font-weight: bold; }}
.modify-me path {{ stroke: #888; }}
</style>
</head>
<body>
{svg}
<script>
for (const link of document.querySelectorAll("a")) {{
  const href = link.getAttribute("xlink:href") || link.getAttribute("href") || "";
  if (!href.startsWith("{prefix}")) continue;
  const classes = href.slice("{prefix}".length).split(".").filter(Boolean);
  const group = link.closest("g") || link;
  group.classList.add(...classes);
  link.removeAttribute("xlink:href");
  link.removeAttribute("href");
}}
</script>
</body>
</html>
"#,
        svg = svg,
        prefix = CELL_HREF_PREFIX,
    )
}
