//! `colloquy config` — Configuration management commands.

use colloquy_config::AppConfig;

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");

            // Additional validation checks
            let mut warnings = Vec::new();

            if !config.has_api_key()
                && !matches!(config.default_backend.as_str(), "ollama" | "vllm")
            {
                warnings.push("No API key set (set COLLOQUY_API_KEY or OPENROUTER_API_KEY)");
            }

            if config.commands.allowed_shell_commands.is_empty() {
                warnings.push("Shell allowlist is empty — the shell command is disabled");
            }

            if config.session.context_budget < 1024 {
                warnings.push("session.context_budget under 1024 tokens will trim aggressively");
            }

            if config.commands.auto_approve {
                warnings.push("commands.auto_approve is on — side-effecting commands run unconfirmed");
            }

            if warnings.is_empty() {
                println!("   ✅ All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   ⚠️  {w}");
                }
            }

            println!();
            println!("   Backend:   {}", config.default_backend);
            println!("   Model:     {}", config.default_model);
            println!("   Budget:    {} tokens", config.session.context_budget);
            println!("   Rounds:    {}", config.session.round_limit);
            println!(
                "   Approval:  {}",
                if config.commands.auto_approve {
                    "auto-approve"
                } else {
                    "read-only"
                }
            );
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    // Serialized output must never leak keys.
    if config.api_key.is_some() {
        config.api_key = Some("[REDACTED]".into());
    }
    for backend in config.backends.values_mut() {
        if backend.api_key.is_some() {
            backend.api_key = Some("[REDACTED]".into());
        }
    }

    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_dir().join("config.toml");
    println!("{}", config_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    #[test]
    fn config_path_is_valid() {
        let path = colloquy_config::AppConfig::config_dir().join("config.toml");
        assert!(path.to_str().unwrap().contains("config.toml"));
    }
}
