// ABOUTME: Interactive terminal session over a Buddy
// ABOUTME: Streams answers as they grow, saves artifacts to disk, Ctrl+C cancels the running turn

use crate::commands::{Command, HELP};
use anyhow::{Context, Result};
use buddy_core::models::{ChartDescriptor, GeneratedFile, Message};
use buddy_core::session::TurnPhase;
use buddy_core::{Buddy, SearchMode, SendRequest, SessionObserver, TurnOutcome};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Prints progress lines on stderr so answers stay clean on stdout
pub struct TerminalObserver;

impl SessionObserver for TerminalObserver {
    fn on_messages_changed(&self, _chat_id: &str) {}

    fn on_phase_changed(&self, chat_id: &str, phase: TurnPhase) {
        tracing::debug!(chat_id = %chat_id, phase = ?phase, "Phase changed");
    }

    fn on_status(&self, _chat_id: &str, status: Option<&str>) {
        if let Some(status) = status {
            eprintln!("[{}]", status);
        }
    }
}

/// Run one turn, printing the answer while it streams
pub async fn run_turn(buddy: &Arc<Buddy>, request: SendRequest, out_dir: &Path) -> Result<()> {
    let chat_id = request
        .chat_id
        .clone()
        .unwrap_or_else(|| buddy.active_chat_id());

    let mut task = tokio::spawn({
        let buddy = buddy.clone();
        async move { buddy.send(request).await }
    });

    let mut printed = String::new();
    let mut tick = tokio::time::interval(Duration::from_millis(50));
    let outcome = loop {
        tokio::select! {
            result = &mut task => break result.context("turn task panicked")??,
            _ = tokio::signal::ctrl_c() => {
                if buddy.cancel_chat(&chat_id) {
                    eprintln!("\n[cancelled]");
                }
            }
            _ = tick.tick() => {
                if let Some(id) = buddy.pending_message(&chat_id) {
                    if let Some(message) = buddy.message(&chat_id, &id) {
                        print_growth(&mut printed, &message.content);
                    }
                }
            }
        }
    };

    match outcome {
        TurnOutcome::Ignored(reason) => {
            eprintln!("[ignored: {:?}]", reason);
            return Ok(());
        }
        TurnOutcome::Failed(reason) => {
            tracing::error!(error = %reason, "Turn failed");
        }
        TurnOutcome::Complete | TurnOutcome::Cancelled => {}
    }

    let chat = buddy
        .chat(&chat_id)
        .context("chat disappeared during the turn")?;
    if let Some(reply) = chat.messages.last() {
        print_growth(&mut printed, &reply.content);
        println!();
        print_extras(buddy, reply, out_dir)?;
    }
    Ok(())
}

/// Print what was appended since the last call; a rewritten message is printed anew
fn print_growth(printed: &mut String, content: &str) {
    use std::io::Write;
    if let Some(tail) = content.strip_prefix(printed.as_str()) {
        print!("{}", tail);
    } else {
        print!("\n{}", content);
    }
    let _ = std::io::stdout().flush();
    *printed = content.to_string();
}

fn print_extras(buddy: &Buddy, reply: &Message, out_dir: &Path) -> Result<()> {
    if let Some(chart) = &reply.chart {
        print_chart(chart);
    }
    for file in &reply.generated_files {
        let path = save_artifact(buddy, file, out_dir)?;
        println!("  -> {} ({})", path.display(), file.format.extension());
    }
    for source in &reply.sources {
        println!("  [{}] {}", source.title, source.uri);
    }
    Ok(())
}

fn print_chart(chart: &ChartDescriptor) {
    println!("\n  {} ({:?})", chart.title, chart.kind);
    let max = chart
        .points
        .iter()
        .map(|p| p.value.abs())
        .fold(0.0_f64, f64::max);
    let width = chart
        .points
        .iter()
        .map(|p| p.label.chars().count())
        .max()
        .unwrap_or(0);
    for point in &chart.points {
        let bar = if max > 0.0 {
            (point.value.abs() / max * 40.0).round() as usize
        } else {
            0
        };
        println!(
            "  {:<width$} {} {}",
            point.label,
            "#".repeat(bar),
            point.value,
            width = width
        );
    }
}

/// Write a blob next to the others; existing files get a numeric suffix
fn save_artifact(buddy: &Buddy, file: &GeneratedFile, out_dir: &Path) -> Result<PathBuf> {
    let blob = buddy
        .blob(&file.handle)
        .with_context(|| format!("artifact {} is no longer available", file.name))?;
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;
    let path = unique_path(out_dir, &blob.name);
    std::fs::write(&path, &blob.bytes)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

fn unique_path(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) => (stem, format!(".{}", ext)),
        None => (name, String::new()),
    };
    (1..)
        .map(|n| dir.join(format!("{}_{}{}", stem, n, ext)))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

/// Read files from disk and ingest them in one batch
pub async fn upload(buddy: &Buddy, paths: &[PathBuf]) -> Result<()> {
    let mut files = Vec::new();
    for path in paths {
        match std::fs::read(path) {
            Ok(bytes) => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| path.display().to_string());
                files.push((name, bytes));
            }
            Err(e) => eprintln!("  ! {}: {}", path.display(), e),
        }
    }
    let result = buddy.upload_batch(files).await;
    for document in &result.documents {
        println!("  + {} ({}, {})", document.name, document.kind, document.size);
    }
    for (name, error) in &result.failures {
        eprintln!("  ! {}: {}", name, error);
    }
    Ok(())
}

fn print_chats(buddy: &Buddy) {
    let active = buddy.active_chat_id();
    for (i, chat) in buddy.chats().iter().enumerate() {
        let marker = if chat.id == active { ">" } else { " " };
        println!(
            "{} {:>2}. {} ({} messages)",
            marker,
            i + 1,
            chat.title,
            chat.messages.len()
        );
    }
}

fn print_docs(buddy: &Buddy) {
    let focus = buddy.focus(&buddy.active_chat_id());
    let documents = buddy.documents();
    if documents.is_empty() {
        println!("  (no documents)");
    }
    for (i, document) in documents.iter().enumerate() {
        let marker = if focus.contains(&document.id) { "*" } else { " " };
        println!("{} {:>2}. {} ({})", marker, i + 1, document.name, document.size);
    }
}

fn print_history(buddy: &Buddy) {
    let chat = buddy.active_chat();
    let strings = buddy.language().strings();
    println!("== {} ==", chat.title);
    for (i, message) in chat.messages.iter().enumerate() {
        let label = if message.is_user() {
            strings.user_label
        } else {
            strings.assistant_label
        };
        println!("{:>2}. {}: {}", i + 1, label, message.content);
    }
}

fn document_id(buddy: &Buddy, n: usize) -> Option<String> {
    buddy.documents().get(n - 1).map(|d| d.id.clone())
}

/// Interactive loop until /quit or end of input
pub async fn run(buddy: Arc<Buddy>, out_dir: PathBuf) -> Result<()> {
    buddy.set_observer(Arc::new(TerminalObserver));
    print_history(&buddy);
    println!("(/help for commands)");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        {
            use std::io::Write;
            let _ = std::io::stdout().flush();
        }
        let Some(line) = lines.next_line().await? else {
            break;
        };

        let command = match Command::parse(&line) {
            Some(command) => command,
            None => {
                if !line.trim().is_empty() {
                    run_turn(&buddy, SendRequest::text(line), &out_dir).await?;
                }
                continue;
            }
        };

        let chat_id = buddy.active_chat_id();
        let result: Result<()> = match command {
            Command::Help => {
                println!("{}", HELP);
                Ok(())
            }
            Command::New => {
                buddy.create_chat();
                print_history(&buddy);
                Ok(())
            }
            Command::Chats => {
                print_chats(&buddy);
                Ok(())
            }
            Command::Switch(n) => match buddy.chats().get(n - 1) {
                Some(chat) => buddy
                    .select_chat(&chat.id)
                    .map(|_| print_history(&buddy))
                    .map_err(Into::into),
                None => Err(anyhow::anyhow!("no chat {}", n)),
            },
            Command::Rename(title) => buddy.rename_chat(&chat_id, &title).map_err(Into::into),
            Command::Delete => buddy
                .delete_chat(&chat_id)
                .map(|_| print_history(&buddy))
                .map_err(Into::into),
            Command::Upload(paths) => upload(&buddy, &paths).await,
            Command::Docs => {
                print_docs(&buddy);
                Ok(())
            }
            Command::Focus(n) => match document_id(&buddy, n) {
                Some(id) => buddy.toggle_focus(&chat_id, &id).map(|on| {
                    println!("  {} {}", if on { "focused" } else { "unfocused" }, n)
                }).map_err(Into::into),
                None => Err(anyhow::anyhow!("no document {}", n)),
            },
            Command::Remove(n) => match document_id(&buddy, n) {
                Some(id) => {
                    buddy.remove_document(&id);
                    Ok(())
                }
                None => Err(anyhow::anyhow!("no document {}", n)),
            },
            Command::Reply(n, text) => match buddy.active_chat().messages.get(n - 1) {
                Some(target) => {
                    let request = SendRequest {
                        text,
                        reply_to: Some(target.id.clone()),
                        ..Default::default()
                    };
                    run_turn(&buddy, request, &out_dir).await
                }
                None => Err(anyhow::anyhow!("no message {}", n)),
            },
            Command::Lang(language) => {
                buddy.set_language(language);
                Ok(())
            }
            Command::Web(on) => {
                buddy.set_search_mode(if on { SearchMode::Web } else { SearchMode::Tools });
                Ok(())
            }
            Command::Export => {
                let strings = buddy.language().strings();
                eprintln!("[{}]", strings.exporting);
                match buddy.export_chat(&chat_id).await {
                    Ok(file) => save_artifact(&buddy, &file, &out_dir)
                        .map(|path| println!("  -> {}", path.display())),
                    Err(e) => Err(e.into()),
                }
            }
            Command::Quit => break,
            Command::Unknown(hint) => Err(anyhow::anyhow!(hint)),
        };

        if let Err(e) = result {
            eprintln!("  ! {:#}", e);
        }
    }

    buddy.shutdown();
    Ok(())
}
