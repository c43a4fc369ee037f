//! `colloquy doctor` — Diagnose system health.

use colloquy_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 Colloquy Doctor — System Diagnostics");
    println!("=======================================\n");

    let mut issues = 0;

    println!("  ✅ Rust binary running");

    // Check config
    let config_path = AppConfig::config_dir().join("config.toml");
    if !config_path.exists() {
        println!("  ❌ No config file — run `colloquy onboard`");
        issues += 1;
    }

    match AppConfig::load() {
        Ok(config) => {
            if config_path.exists() {
                println!("  ✅ Config file valid");
            }

            // Check API key
            if config.has_api_key() {
                println!("  ✅ API key configured");
            } else if matches!(config.default_backend.as_str(), "ollama" | "vllm") {
                println!("  ✅ Local backend selected — no API key needed");
            } else {
                println!("  ⚠️  No API key configured — add api_key to config.toml");
                issues += 1;
            }

            // Check workspace
            let workspace_dir = config.workspace_dir();
            if workspace_dir.exists() {
                println!("  ✅ Workspace directory exists");
            } else {
                println!("  ⚠️  No workspace directory — run `colloquy onboard`");
                issues += 1;
            }

            if config.commands.allowed_shell_commands.is_empty() {
                println!("  ✅ Shell command disabled (empty allowlist)");
            } else {
                println!(
                    "  ✅ Shell allowlist: {} commands",
                    config.commands.allowed_shell_commands.len()
                );
            }
        }
        Err(e) => {
            println!("  ❌ Config file invalid: {e}");
            issues += 1;
        }
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
