use std::path::{Path, PathBuf};
use std::process;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use tokio::sync::mpsc;

use taglog_curator::app::events::{IpcMessage, UserEvent};
use taglog_curator::app::proxy::EventProxy;
use taglog_curator::app::state::AppState;
use taglog_curator::app::tasks::LocalTagLogService;
use taglog_curator::app::{self, view_model::UiState};
use taglog_curator::core::tags;

#[derive(Parser)]
#[command(name = "taglog-curator", version, about = "Curate tag log files: scan, preview, and apply tag removals")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan a directory tree and print the aggregated tag index.
    Scan {
        /// Root directory containing the tag log files.
        root: PathBuf,
        /// Hide tags occurring fewer than this many times.
        #[arg(long, default_value_t = 5)]
        min_count: usize,
        /// File with one banned rule per line; matching tags are excluded.
        #[arg(long)]
        banned_file: Option<PathBuf>,
        /// Match banned rules case-insensitively.
        #[arg(long)]
        case_insensitive: bool,
    },
    /// Show which files would change for a selection, without writing.
    Preview {
        root: PathBuf,
        /// Tag to remove, as NAMESPACE:TAG (repeatable). Bare names use the
        /// default namespace.
        #[arg(long = "remove", value_name = "NS:TAG")]
        remove: Vec<String>,
        #[arg(long)]
        banned_file: Option<PathBuf>,
        #[arg(long)]
        case_insensitive: bool,
        /// Sort surviving tag lines alphabetically.
        #[arg(long)]
        sort_lines: bool,
    },
    /// Rewrite the files, backing every changed file up first.
    Apply {
        root: PathBuf,
        #[arg(long = "remove", value_name = "NS:TAG")]
        remove: Vec<String>,
        #[arg(long)]
        banned_file: Option<PathBuf>,
        #[arg(long)]
        case_insensitive: bool,
        #[arg(long)]
        sort_lines: bool,
    },
    /// Normalize a banned-rule file and print the result.
    ExportBanned {
        /// Rule file to normalize.
        file: PathBuf,
    },
}

/// Delivers backend events to the CLI driver over a channel.
#[derive(Clone)]
struct ChannelProxy {
    sender: mpsc::UnboundedSender<UserEvent>,
}

impl EventProxy for ChannelProxy {
    fn send_event(&self, event: UserEvent) {
        let _ = self.sender.send(event);
    }
}

/// One CLI invocation driving the workflow backend.
struct Session {
    service: Arc<LocalTagLogService>,
    proxy: ChannelProxy,
    receiver: mpsc::UnboundedReceiver<UserEvent>,
    state: Arc<Mutex<AppState>>,
}

impl Session {
    fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            service: Arc::new(LocalTagLogService),
            proxy: ChannelProxy { sender },
            receiver,
            state: Arc::new(Mutex::new(AppState::default())),
        }
    }

    fn send(&self, command: &str, payload: serde_json::Value) {
        app::handle_ipc_message(
            IpcMessage {
                command: command.to_string(),
                payload,
            },
            &self.service,
            &self.proxy,
            &self.state,
        );
    }

    /// Discards queued events from synchronous commands, so the next
    /// `settle` only sees the operation it is waiting for.
    fn drain(&mut self) {
        while self.receiver.try_recv().is_ok() {}
    }

    /// Waits for the in-flight operation to settle, collecting side events.
    /// Returns the final state snapshot, or the error message if the
    /// operation failed.
    async fn settle(&mut self) -> Result<(UiState, Vec<UserEvent>)> {
        let mut side_events = Vec::new();
        while let Some(event) = self.receiver.recv().await {
            match event {
                UserEvent::StateUpdate(ui) if !ui.is_busy => return Ok((*ui, side_events)),
                UserEvent::StateUpdate(_) => {}
                UserEvent::ShowError(message) => bail!(message),
                other => side_events.push(other),
            }
        }
        bail!("Backend hung up before the operation settled")
    }

    fn configure(
        &self,
        root: &Path,
        min_count: usize,
        banned_file: Option<&Path>,
        case_insensitive: bool,
        sort_lines: bool,
    ) -> Result<()> {
        self.send("setRootPath", json!({ "path": root.to_string_lossy() }));
        self.send(
            "updateOptions",
            json!({
                "min_count": min_count,
                "case_insensitive": case_insensitive,
                "sort_lines": sort_lines,
            }),
        );
        if let Some(path) = banned_file {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read banned rules from {}", path.display()))?;
            self.send("updateBannedText", json!({ "text": text }));
        }
        Ok(())
    }

    /// Scans, then marks the requested tags for removal. Selection toggles
    /// require tags present in the index, so the scan runs with a threshold
    /// of one here regardless of the display default.
    async fn select_for_removal(&mut self, remove: &[String]) -> Result<()> {
        self.drain();
        self.send("scan", json!({}));
        self.settle().await?;
        for entry in remove {
            let Some(parsed) = tags::parse_tag_line(entry) else {
                bail!("Invalid tag selector: {entry:?}");
            };
            self.send(
                "toggleTag",
                json!({ "namespace": parsed.namespace, "tag": parsed.tag }),
            );
        }
        Ok(())
    }
}

fn print_index(ui: &UiState) {
    for group in &ui.namespaces {
        println!("{}:", group.name);
        for tag in &group.tags {
            println!("  {:6}  {}", tag.count, tag.name);
        }
    }
    println!(
        "{} tags across {} files",
        ui.visible_tag_count, ui.total_files
    );
}

async fn run(cli: Cli) -> Result<()> {
    let mut session = Session::new();
    match cli.command {
        Command::Scan {
            root,
            min_count,
            banned_file,
            case_insensitive,
        } => {
            session.configure(&root, min_count, banned_file.as_deref(), case_insensitive, false)?;
            session.drain();
            session.send("scan", json!({}));
            let (ui, _) = session.settle().await?;
            print_index(&ui);
        }
        Command::Preview {
            root,
            remove,
            banned_file,
            case_insensitive,
            sort_lines,
        } => {
            session.configure(&root, 1, banned_file.as_deref(), case_insensitive, sort_lines)?;
            session.select_for_removal(&remove).await?;
            session.drain();
            session.send("preview", json!({}));
            let (ui, events) = session.settle().await?;
            for event in events {
                if let UserEvent::ShowPreview(response) = event {
                    for preview in &response.previews {
                        println!("--- {}", preview.file);
                        for line in &preview.before {
                            println!("  - {line}");
                        }
                        for line in &preview.after {
                            println!("  + {line}");
                        }
                    }
                }
            }
            println!("{}", ui.status_message);
        }
        Command::Apply {
            root,
            remove,
            banned_file,
            case_insensitive,
            sort_lines,
        } => {
            session.configure(&root, 1, banned_file.as_deref(), case_insensitive, sort_lines)?;
            session.select_for_removal(&remove).await?;
            session.drain();
            session.send("apply", json!({}));
            let (ui, _) = session.settle().await?;
            println!("{}", ui.status_message);
        }
        Command::ExportBanned { file } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read banned rules from {}", file.display()))?;
            session.send("updateBannedText", json!({ "text": text }));
            session.send("exportBannedRules", json!({}));
            while let Ok(event) = session.receiver.try_recv() {
                if let UserEvent::BannedRulesExported { content, .. } = event {
                    println!("{content}");
                }
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
