//! `biochat chat` — Interactive or single-message chat from the terminal.
//!
//! Runs the same pipeline as the gateway, in one local session.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use biochat_agent::ChatPipeline;
use biochat_core::conversation::SessionId;
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run(
    config_path: Option<&Path>,
    message: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config =
        super::load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;

    if let Err(e) = config.validate_for_serving() {
        eprintln!();
        eprintln!("  ERROR: {e}");
        eprintln!();
        eprintln!("  Set OPENAI_API_KEY (or BIOCHAT_API_KEY), and either SUPABASE_URL +");
        eprintln!("  SUPABASE_API_KEY or BIOCHAT_INDEX_BACKEND=memory with BIOCHAT_PASSAGES_FILE.");
        eprintln!("  A .env file in the working directory is read automatically.");
        eprintln!();
        return Err(e.into());
    }

    let provider = biochat_providers::build_from_config(&config)?;
    let index = biochat_index::build_from_config(&config)?;
    let pipeline = Arc::new(ChatPipeline::from_config(&config, provider, index)?);
    let session = SessionId::new();

    if let Some(msg) = message {
        // Single message mode
        eprint!("  Thinking...");
        let reply = pipeline.answer(&session, &msg).await;
        eprint!("\r              \r");
        println!("{}", reply?);
        return Ok(());
    }

    // Interactive mode
    println!();
    println!("  biochat — interactive mode");
    println!();
    println!("  Model:    {}", config.generation.model);
    println!("  Index:    {}", pipeline.index_name());
    println!("  Persona:  {}", pipeline.persona().version);
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or Ctrl+C to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    print!("  You > ");
    std::io::stdout().flush()?;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
            break;
        }
        if !line.is_empty() {
            eprint!("  ...");
            match pipeline.answer(&session, line).await {
                Ok(reply) => {
                    eprint!("\r     \r");
                    println!();
                    for text in reply.lines() {
                        println!("  Assistant > {text}");
                    }
                    println!();
                }
                Err(e) => {
                    eprint!("\r     \r");
                    eprintln!("  [Error] {e}");
                    println!();
                }
            }
        }

        print!("  You > ");
        std::io::stdout().flush()?;
    }

    println!();
    println!("  Goodbye!");
    println!();

    Ok(())
}
