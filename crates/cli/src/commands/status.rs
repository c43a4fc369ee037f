//! `colloquy status` — Show system status.

use colloquy_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    println!("💬 Colloquy Status");
    println!("==================");
    println!("  Config dir:    {}", AppConfig::config_dir().display());
    println!("  Workspace:     {}", config.workspace_dir().display());
    println!("  Backend:       {}", config.default_backend);
    println!("  Model:         {}", config.default_model);
    println!("  Temperature:   {}", config.session.temperature);
    println!("  Max tokens:    {}", config.session.max_tokens);
    println!("  Context:       {} tokens", config.session.context_budget);
    println!("  Round limit:   {}", config.session.round_limit);
    println!(
        "  API key:       {}",
        if config.has_api_key() {
            "configured"
        } else {
            "not set"
        }
    );
    println!(
        "  Approval:      {}",
        if config.commands.auto_approve {
            "auto-approve"
        } else {
            "read-only"
        }
    );
    if config.commands.allowed_shell_commands.is_empty() {
        println!("  Shell:         disabled");
    } else {
        println!(
            "  Shell:         {} allowed commands",
            config.commands.allowed_shell_commands.len()
        );
    }
    println!(
        "  Retry:         {} retries, {}ms base delay",
        config.retry.max_retries, config.retry.base_delay_ms
    );

    // Check config file existence
    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("\n  ✅ Config file found");
    } else {
        println!("\n  ⚠️  No config file — run `colloquy onboard` first");
    }

    Ok(())
}
