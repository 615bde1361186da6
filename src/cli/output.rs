//! Terminal rendering for answers and documents

use colored::{ColoredString, Colorize};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::agent::WorkflowOutcome;
use crate::rag::ConfidenceLevel;
use crate::types::{char_prefix, Document};

/// Characters of document text shown by the `document` subcommand
pub const DOCUMENT_PREVIEW_CHARS: usize = 2000;

/// Spinner shown while a request runs
pub fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Confidence label colored by level
pub fn confidence_label(level: ConfidenceLevel) -> ColoredString {
    let label = format!("Confidence: {}", level.as_str().to_uppercase());
    match level {
        ConfidenceLevel::High => label.green().bold(),
        ConfidenceLevel::Medium => label.yellow().bold(),
        ConfidenceLevel::Low | ConfidenceLevel::Insufficient => label.red().bold(),
    }
}

pub fn print_outcome(outcome: &WorkflowOutcome) {
    println!("{}", confidence_label(outcome.confidence));
    if let Some(reformulated) = &outcome.reformulated_query {
        println!(
            "{}",
            format!(
                "Reformulated query ({} attempt(s)): {}",
                outcome.reformulation_attempts, reformulated
            )
            .dimmed()
        );
    }
    println!();
    println!("{}", outcome.answer);
}

pub fn print_document(document: &Document) {
    println!("{}", document.title.bold());
    println!("  Date:    {}", document.date);
    println!("  Type:    {}", document.document_type);
    println!("  Source:  {}", document.source_url);
    println!("  Chunks:  {}", document.chunk_count);
    println!();

    let preview = char_prefix(&document.full_text, DOCUMENT_PREVIEW_CHARS);
    println!("{}", preview);
    if preview.len() < document.full_text.len() {
        println!("{}", "... (truncated)".dimmed());
    }
}
