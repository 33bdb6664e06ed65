use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use nd_core::{ArticleStorage, CompletionModel, Result};
use nd_export::{export, ExportDocument, ExportFormat, PdfRenderer};
use nd_inference::{create_model, Config, Pipeline, PipelineRequest, PromptSet};
use nd_storage::{create_storage, StorageConfig};
use nd_web::{create_app, AppState};
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "News digest and aggregator article pipeline", long_about = None)]
pub struct Cli {
    /// Where articles are kept: `memory` or `sqlite:<path>`.
    #[arg(long, env = "ND_STORAGE", default_value = "memory")]
    storage: String,
    #[arg(long, env = "ND_MODEL", default_value = "openai", help = "Completion provider: openai (default), deepseek, dummy")]
    model: String,
    #[arg(long, env = "ND_MODEL_NAME")]
    model_name: Option<String>,
    #[arg(long, env = "ND_MODEL_URL")]
    model_url: Option<String>,
    #[arg(long, env = "ND_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
    /// JSON file overriding the default prompt templates.
    #[arg(long, env = "ND_PROMPTS")]
    prompts: Option<PathBuf>,
    /// Browser used to print PDFs.
    #[arg(long, env = "ND_CHROME", default_value = "chromium")]
    chrome: PathBuf,
    #[arg(long, default_value_t = 120, help = "Completion request timeout in seconds")]
    timeout: u64,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Serve the HTTP API.
    Serve {
        #[arg(long, env = "ND_BIND", default_value = "127.0.0.1:3000")]
        bind: String,
    },
    /// Run the whole pipeline on a JSON pipeline request.
    Run {
        #[arg(long)]
        input: PathBuf,
        /// Write the run as JSON here instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
        /// Save the finished article as a new version.
        #[arg(long)]
        save: bool,
        #[arg(long, default_value = "")]
        org: String,
        #[arg(long, default_value = "")]
        creator: String,
    },
    /// Render a JSON export document as docx, pdf or html.
    Export {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, default_value = "docx")]
        format: String,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Inspect the prompt templates.
    Prompts {
        #[command(subcommand)]
        command: PromptCommands,
    },
}

#[derive(clap::Subcommand, Debug)]
enum PromptCommands {
    /// Print the active prompt set as JSON, a starting point for overrides.
    Dump,
}

impl Cli {
    fn model_config(&self) -> Config {
        Config {
            provider: self.model.clone(),
            api_key: self.api_key.clone(),
            model_name: self.model_name.clone(),
            model_url: self.model_url.clone(),
            timeout: Duration::from_secs(self.timeout),
            ..Config::default()
        }
    }

    fn load_prompts(&self) -> Result<PromptSet> {
        match &self.prompts {
            Some(path) => {
                let prompts = PromptSet::load(path)?;
                info!("📝 Prompts loaded from {}", path.display());
                Ok(prompts)
            }
            None => Ok(PromptSet::default()),
        }
    }

    fn create_model(&self) -> Result<Arc<dyn CompletionModel>> {
        let model = create_model(&self.model_config())?;
        info!("🧠 Inference model initialized successfully (using {})", model.name());
        Ok(model)
    }

    async fn create_storage(&self) -> Result<Arc<dyn ArticleStorage>> {
        let config: StorageConfig = self.storage.parse()?;
        let storage = create_storage(&config).await?;
        info!("✨ Storage initialized successfully (using {})", self.storage);
        Ok(storage)
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let value: T = serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
    Ok(value)
}

fn write_output(path: Option<&Path>, bytes: &[u8]) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, bytes).with_context(|| format!("writing {}", path.display()))?;
            info!("📄 Wrote {} ({} bytes)", path.display(), bytes.len());
        }
        None => {
            use std::io::Write;
            std::io::stdout().write_all(bytes)?;
        }
    }
    Ok(())
}

async fn serve(cli: &Cli, bind: &str) -> Result<()> {
    let state = AppState::new(cli.create_model()?, cli.load_prompts()?, cli.create_storage().await?)
        .with_pdf(PdfRenderer::new(&cli.chrome));
    let app = create_app(state).await;

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("binding {}", bind))?;
    info!("🚀 Listening on http://{}", bind);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn run(cli: &Cli, input: &Path, output: Option<&Path>, save: bool, org: &str, creator: &str) -> Result<()> {
    let request: PipelineRequest = read_json(input)?;
    let pipeline = Pipeline::new(cli.create_model()?, Arc::new(cli.load_prompts()?));
    let run = pipeline.run(request).await?;
    info!("✨ Run {} finished, {} tokens used", run.run_id, run.usage.total());

    if save {
        let storage = cli.create_storage().await?;
        let mut article = run.to_new_article()?;
        article.org_id = org.to_string();
        article.creator_id = creator.to_string();
        let saved = storage.save_article(article).await?;
        info!("💾 Saved as {} v{}", saved.slug, saved.version);
    }

    let json = serde_json::to_vec_pretty(&run)?;
    write_output(output, &json)
}

async fn export_file(cli: &Cli, input: &Path, format: &str, output: Option<&Path>) -> Result<()> {
    let format: ExportFormat = format.parse()?;
    let doc: ExportDocument = read_json(input)?;
    let bytes = export(&doc, format, &PdfRenderer::new(&cli.chrome)).await?;
    write_output(output, &bytes)
}

#[tokio::main]
async fn main() -> Result<()> {
    nd_core::init_logging();
    let cli = Cli::parse();

    match &cli.command {
        Commands::Serve { bind } => serve(&cli, bind).await,
        Commands::Run {
            input,
            output,
            save,
            org,
            creator,
        } => run(&cli, input, output.as_deref(), *save, org, creator).await,
        Commands::Export { input, format, output } => export_file(&cli, input, format, output.as_deref()).await,
        Commands::Prompts {
            command: PromptCommands::Dump,
        } => {
            let prompts = cli.load_prompts()?;
            write_output(None, &serde_json::to_vec_pretty(&prompts)?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nd_core::Source;
    use serde_json::Value;
    use tempfile::tempdir;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("nd").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_model_config_from_flags() {
        let cli = parse(&["--model", "deepseek", "--model-name", "deepseek-chat", "--timeout", "5", "prompts", "dump"]);
        let config = cli.model_config();
        assert_eq!(config.provider, "deepseek");
        assert_eq!(config.model_name.as_deref(), Some("deepseek-chat"));
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn test_every_subcommand_has_help() {
        use clap::CommandFactory;
        for sub in Cli::command().get_subcommands() {
            assert!(sub.get_about().is_some(), "{} has no help", sub.get_name());
        }
    }

    #[test]
    fn test_run_requires_input() {
        assert!(Cli::try_parse_from(["nd", "run"]).is_err());
    }

    #[tokio::test]
    async fn test_run_with_dummy_model_writes_json() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("request.json");
        let output = dir.path().join("run.json");
        let request = PipelineRequest {
            sources: vec![Source::new(1, "AP", "The river rose two meters overnight.")],
            ..Default::default()
        };
        std::fs::write(&input, serde_json::to_string(&request).unwrap()).unwrap();

        let cli = parse(&["--model", "dummy", "run", "--input", "unused"]);
        run(&cli, &input, Some(&output), true, "acme", "ed").await.unwrap();

        let written: Value = serde_json::from_slice(&std::fs::read(&output).unwrap()).unwrap();
        assert!(written["runId"].is_string());
        assert!(written["outputs"]["headline"].is_string());
    }

    #[tokio::test]
    async fn test_export_html_file() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("doc.json");
        let output = dir.path().join("doc.html");
        let doc = ExportDocument {
            headline: "Harbor Closes".to_string(),
            content: "Ships wait offshore.".to_string(),
            ..Default::default()
        };
        std::fs::write(&input, serde_json::to_string(&doc).unwrap()).unwrap();

        let cli = parse(&["export", "--input", "unused"]);
        export_file(&cli, &input, "html", Some(&output)).await.unwrap();
        let html = std::fs::read_to_string(&output).unwrap();
        assert!(html.contains("Harbor Closes"));
        assert!(export_file(&cli, &input, "odt", Some(&output)).await.is_err());
    }
}
