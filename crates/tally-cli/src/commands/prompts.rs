//! Prompt inspection commands

use std::path::Path;

use anyhow::{Context, Result};
use tally_core::extract::{DocumentExtractor, TextExtractor};
use tally_core::prompts::{default_prompts_dir, PromptBuilder, PromptId, MAX_STATEMENT_CHARS};

/// Show the categorization template and its source
pub fn cmd_prompt_show(prompts: &PromptBuilder) -> Result<()> {
    let prompt = prompts.template();

    println!("Prompt: {}", prompt.metadata.id);
    println!("Version: {}", prompt.metadata.version);
    println!(
        "Source: {}",
        if prompt.is_override {
            "Override"
        } else {
            "Default"
        }
    );
    if let Some(ref path) = prompt.override_path {
        println!("Override Path: {}", path.display());
    }

    let taxonomy = prompts.taxonomy();
    println!();
    println!("Income categories: {}", taxonomy.income.join(", "));
    println!("Expense categories: {}", taxonomy.expenses.join(", "));

    println!();
    println!("--- Content ---");
    println!("{}", prompt.content);

    Ok(())
}

/// Render the exact prompt the AI backend would receive for a statement
pub fn cmd_prompt_render(prompts: &PromptBuilder, file: &Path) -> Result<()> {
    let document =
        std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let text = DocumentExtractor.extract_text(&document)?;

    let chars = text.chars().count();
    if chars > MAX_STATEMENT_CHARS {
        eprintln!(
            "Note: statement text has {} characters; only the first {} are sent.",
            chars, MAX_STATEMENT_CHARS
        );
    }

    println!("{}", prompts.build(&text));
    Ok(())
}

/// Show the path where prompt overrides should be placed
pub fn cmd_prompt_path() -> Result<()> {
    match default_prompts_dir() {
        Some(path) => {
            println!(
                "{}",
                path.join(format!("{}.md", PromptId::CategorizeStatement.as_str()))
                    .display()
            );

            if !path.exists() {
                eprintln!();
                eprintln!("Note: This directory does not exist yet.");
                eprintln!("Create it to start customizing the prompt.");
            }
        }
        None => {
            eprintln!("Could not determine prompts directory.");
            eprintln!("The data directory is not available on this system.");
        }
    }

    Ok(())
}
