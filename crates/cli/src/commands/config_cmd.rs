//! `biochat config` — Configuration commands.

use std::path::Path;

pub fn show(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config =
        super::load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    println!("{}", config.redacted_toml());
    Ok(())
}

pub fn validate(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    let config = match super::load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    };
    println!("   ✅ Config parsed successfully");

    if let Err(e) = config.validate_for_serving() {
        println!("   ❌ {e}");
        return Err(e.into());
    }
    println!("   ✅ Ready to serve");

    println!();
    println!("   Model:      {}", config.generation.model);
    println!("   Embedding:  {}", config.embedding.model);
    println!("   Index:      {}", config.index.backend);
    println!(
        "   Matching:   threshold {} / count {}",
        config.index.match_threshold, config.index.match_count
    );
    println!("   Gateway:    {}", config.bind_addr());
    println!("   Persona:    {}", config.persona.version);

    Ok(())
}

pub fn path(config_path: Option<&Path>) {
    println!("{}", super::config_file(config_path).display());
}

#[cfg(test)]
mod tests {
    use super::super::config_file;
    use std::path::Path;

    #[test]
    fn default_config_path() {
        assert_eq!(config_file(None), Path::new("biochat.toml"));
    }

    #[test]
    fn explicit_config_path_wins() {
        let path = Path::new("/etc/biochat/prod.toml");
        assert_eq!(config_file(Some(path)), path);
    }
}
