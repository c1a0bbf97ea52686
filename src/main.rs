use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tribunal_assist::analysis::AnalysisResult;
use tribunal_assist::config::Config;
use tribunal_assist::dispatch::ProviderDispatch;
use tribunal_assist::errors::AssistError;
use tribunal_assist::logging;
use tribunal_assist::operations::{CaseInput, CaseOperation};
use tribunal_assist::provider::{ProviderSelection, SelectionSource};
use tribunal_assist::settings::SettingsStore;
use tribunal_assist::types::{ChatMessage, DocumentContent, Progress, ProgressSink};

#[derive(Parser)]
#[command(name = "tribunal-assist", version, about = "AI evidence assistant for employment tribunal claimants")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show or change the active AI provider
    Provider {
        #[command(subcommand)]
        action: ProviderAction,
    },
    /// Manage cloud provider API keys
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },
    /// Analyze one document and print the result as JSON
    Analyze {
        file: PathBuf,
        /// Document id used for item ids (default: random)
        #[arg(long)]
        doc_id: Option<String>,
    },
    /// Ask a question about the case
    Chat {
        message: String,
        /// Text file with case context
        #[arg(long)]
        context: Option<PathBuf>,
        /// JSON file with prior messages: [{"role": "user", "content": "..."}]
        #[arg(long)]
        history: Option<PathBuf>,
    },
    /// Compare several document analyses (cloud providers only)
    CrossAnalyze {
        /// Analysis JSON files, as printed by `analyze`
        #[arg(required = true)]
        analyses: Vec<PathBuf>,
    },
    /// Build an appeal pack from document analyses (cloud providers only)
    AppealPack {
        #[arg(long, required = true, num_args = 1..)]
        analyses: Vec<PathBuf>,
        #[arg(long)]
        claim_summary: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Run a case-level operation on Gemini (e.g. build-chronology)
    CaseOp {
        operation: CaseOperation,
        /// JSON file with {"caseSummary", "analyses", "notes"}
        #[arg(long)]
        input: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ProviderAction {
    /// Print the active provider
    Show,
    /// Select gemini, groq or webllm
    Set { provider: ProviderSelection },
}

#[derive(Subcommand)]
enum KeyAction {
    /// Store an API key (an empty key removes it)
    Set { provider: ProviderSelection, key: String },
    /// Check a key against the provider. Uses the stored key unless one is given
    Validate {
        provider: ProviderSelection,
        #[arg(long)]
        key: Option<String>,
    },
}

/// Progress bar fed by local-model progress events.
fn progress_bar() -> (ProgressBar, ProgressSink) {
    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{bar:40} {pos:>3}% {msg} [{elapsed_precise}]")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    let sink: ProgressSink = {
        let pb = pb.clone();
        Arc::new(move |p: Progress| {
            pb.set_position((p.fraction * 100.0).round() as u64);
            pb.set_message(p.text);
        })
    };
    (pb, sink)
}

/// Read a document, sending text formats as text and everything else base64-encoded.
fn load_document(path: &Path) -> Result<DocumentContent> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let mime = match ext.as_str() {
        "txt" | "md" | "csv" | "eml" | "html" | "htm" | "json" => None,
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "pdf" => Some("application/pdf"),
        _ => Some("application/octet-stream"),
    };

    match mime {
        None => {
            let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
            Ok(DocumentContent::text(text))
        }
        Some(mime) => {
            let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
            Ok(DocumentContent::encoded(mime, &bytes))
        }
    }
}

fn load_analyses(paths: &[PathBuf]) -> Result<Vec<AnalysisResult>> {
    paths
        .iter()
        .map(|path| {
            let json = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&json).with_context(|| format!("{} is not an analysis result", path.display()))
        })
        .collect()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Undo a local selection whose model cannot load, so the next run uses the cloud.
fn handle_local_failure<T>(result: Result<T, AssistError>, settings: &SettingsStore) -> Result<T> {
    match result {
        Err(e) if e.is_runtime_initialization() => {
            let provider = settings.revert_to_cloud()?;
            eprintln!("{}", e);
            eprintln!("Switched the AI provider back to {}.", provider);
            Err(e.into())
        }
        other => Ok(other?),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Parse CLI args
    let cli = Cli::parse();

    // 2. Load configuration
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Config error (using defaults): {}", e);
        Config::default()
    });

    // 3. Initialize logging before any other output. Results go to stdout, logs to stderr
    logging::init_logging(&config);

    let settings = Arc::new(SettingsStore::from_config(&config)?);
    let dispatch = ProviderDispatch::from_config(&config, settings.clone());
    let active = settings.current();

    match cli.command {
        Commands::Provider { action } => match action {
            ProviderAction::Show => println!("{}", active),
            ProviderAction::Set { provider } => {
                settings.set_selection(provider)?;
                println!("AI provider set to {}.", provider);
            }
        },

        Commands::Key { action } => match action {
            KeyAction::Set { provider, key } => {
                settings.set_api_key(provider, &key)?;
                println!("Saved {} API key.", provider);
            }
            KeyAction::Validate { provider, key } => {
                let key = match key {
                    Some(k) => Some(k),
                    None => settings.api_key(provider)?,
                };
                let Some(key) = key else {
                    anyhow::bail!("No {} API key stored. Run `tribunal-assist key set {} <key>`", provider, provider);
                };
                if dispatch.validate_key(provider, &key).await {
                    println!("{} API key is valid.", provider);
                } else {
                    println!("{} API key was rejected.", provider);
                    std::process::exit(1);
                }
            }
        },

        Commands::Analyze { file, doc_id } => {
            let content = load_document(&file)?;
            let name = file_name(&file);
            let doc_id = doc_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            let api_key = settings.api_key(active)?;

            let (pb, sink) = progress_bar();
            let progress = active.is_local().then_some(&sink);
            let result = dispatch
                .analyze_document(&content, &name, &doc_id, api_key.as_deref(), progress)
                .await;
            pb.finish_and_clear();

            match handle_local_failure(result, &settings)? {
                Some(analysis) => println!("{}", serde_json::to_string_pretty(&analysis)?),
                None => {
                    eprintln!("The local model could not produce a usable analysis of {}. Try again or use a cloud provider.", name);
                    std::process::exit(2);
                }
            }
        }

        Commands::Chat { message, context, history } => {
            let context = match context {
                Some(path) => std::fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?,
                None => String::new(),
            };
            let history: Vec<ChatMessage> = match history {
                Some(path) => {
                    let json = std::fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?;
                    serde_json::from_str(&json).with_context(|| format!("{} is not a message list", path.display()))?
                }
                None => Vec::new(),
            };
            let api_key = settings.api_key(active)?;

            let (pb, sink) = progress_bar();
            let progress = active.is_local().then_some(&sink);
            let answer = dispatch
                .send_chat_message(&message, &context, &history, api_key.as_deref(), progress)
                .await;
            pb.finish_and_clear();

            println!("{}", handle_local_failure(answer, &settings)?);
        }

        Commands::CrossAnalyze { analyses } => {
            let analyses = load_analyses(&analyses)?;
            let api_key = settings.api_key(active)?;
            let report = dispatch.deep_cross_analysis(&analyses, api_key.as_deref()).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Commands::AppealPack { analyses, claim_summary, notes } => {
            let request = CaseInput {
                case_summary: claim_summary.unwrap_or_default(),
                analyses: load_analyses(&analyses)?,
                notes,
            };
            let api_key = settings.api_key(active)?;
            let pack = dispatch.generate_appeal_pack(&request, api_key.as_deref()).await?;
            println!("{}", serde_json::to_string_pretty(&pack)?);
        }

        Commands::CaseOp { operation, input } => {
            let input: CaseInput = match input {
                Some(path) => {
                    let json = std::fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?;
                    serde_json::from_str(&json).with_context(|| format!("{} is not a case input", path.display()))?
                }
                None => CaseInput::default(),
            };
            // Case operations always run on Gemini
            let api_key = settings.api_key(ProviderSelection::Gemini)?;
            let value = dispatch.run_case_operation(operation, &input, api_key.as_deref()).await?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
    }

    Ok(())
}
