//! `biochat doctor` — Diagnose configuration and backend health.

use std::path::Path;

use biochat_config::IndexBackend;
use biochat_core::persona::Persona;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("biochat doctor — system diagnostics");
    println!("===================================\n");

    let mut issues = 0;

    let file = super::config_file(config_path);
    if file.exists() {
        println!("  ✅ Config file found: {}", file.display());
    } else {
        println!("  ⚠️  No config file at {} — using defaults and environment", file.display());
    }

    let config = match super::load_config(config_path) {
        Ok(config) => {
            println!("  ✅ Configuration valid");
            config
        }
        Err(e) => {
            println!("  ❌ Configuration invalid: {e}");
            println!("\n  ⚠️  1 issue(s) found. Fix the configuration and run again.");
            return Ok(());
        }
    };

    match Persona::resolve(
        &config.persona.version,
        config.persona.system_prompt_override.as_deref(),
        config.persona.system_prompt_file.as_deref(),
    ) {
        Ok(persona) => println!(
            "  ✅ Persona {} (~{} tokens)",
            persona.version,
            persona.estimated_tokens()
        ),
        Err(e) => {
            println!("  ❌ Persona: {e}");
            issues += 1;
        }
    }

    if let Err(e) = config.validate_for_serving() {
        println!("  ❌ Not ready to serve: {e}");
        issues += 1;
    }

    if config.has_api_key() {
        match biochat_providers::build_from_config(&config) {
            Ok(provider) => match provider.health_check().await {
                Ok(true) => println!("  ✅ Model API reachable ({})", config.generation.api_url),
                Ok(false) => {
                    println!("  ❌ Model API rejected the health check ({})", config.generation.api_url);
                    issues += 1;
                }
                Err(e) => {
                    println!("  ❌ Model API unreachable: {e}");
                    issues += 1;
                }
            },
            Err(e) => {
                println!("  ❌ Model client: {e}");
                issues += 1;
            }
        }
    } else {
        println!("  ⚠️  No API key configured — set OPENAI_API_KEY");
    }

    let index_ready = match config.index.backend {
        IndexBackend::Supabase => config.index.url.is_some() && config.index.api_key.is_some(),
        IndexBackend::Memory => config.index.passages_file.is_some(),
    };
    if index_ready {
        match biochat_index::build_from_config(&config) {
            Ok(index) => println!("  ✅ Similarity index ready ({})", index.name()),
            Err(e) => {
                println!("  ❌ Similarity index: {e}");
                issues += 1;
            }
        }
    } else {
        println!("  ⚠️  Similarity index ({}) not configured", config.index.backend);
    }

    // Summary
    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
