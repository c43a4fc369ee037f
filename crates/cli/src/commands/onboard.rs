//! `colloquy onboard` — First-time setup.

use colloquy_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    println!("💬 Colloquy — First-Time Setup");
    println!("==============================\n");

    // Create directories
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("✅ Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    // Create config file
    if config_path.exists() {
        println!("\n⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run onboard.\n");
    } else {
        std::fs::write(&config_path, AppConfig::default_toml())?;
        println!("✅ Created config.toml at: {}", config_path.display());
    }

    // The workspace honors a configured override, so resolve it after the
    // config file exists.
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let workspace_dir = config.workspace_dir();
    if !workspace_dir.exists() {
        std::fs::create_dir_all(&workspace_dir)?;
        println!("✅ Created workspace directory: {}", workspace_dir.display());
    }

    let readme_path = workspace_dir.join("README.md");
    if !readme_path.exists() {
        std::fs::write(
            &readme_path,
            concat!(
                "# Colloquy Workspace\n\n",
                "Files in this directory are visible to the assistant: it can list,\n",
                "read, and (with approval) write them through its file commands.\n",
            ),
        )?;
        println!("✅ Created workspace README.md");
    }

    println!("\n📝 Next steps:");
    println!("   1. Edit {} and add your API key", config_path.display());
    println!("      (or set COLLOQUY_API_KEY / OPENROUTER_API_KEY / OPENAI_API_KEY)");
    println!("   2. Run: colloquy chat");
    println!("   3. Start chatting!\n");

    println!("🎉 Setup complete! Run `colloquy chat` to start chatting.\n");

    Ok(())
}
