//! `colloquy commands` — List the commands the model can call.

use colloquy_config::AppConfig;
use colloquy_core::SideEffect;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let registry = colloquy_plugins::default_registry(
        config.workspace_dir(),
        config.commands.allowed_shell_commands.clone(),
    );

    println!("🔧 Available Commands");
    println!("=====================");
    println!();

    for descriptor in registry.descriptors() {
        println!(
            "  {:<12} {:<15} {:>4}s  {}",
            descriptor.name,
            side_effect_label(descriptor.side_effect),
            descriptor.timeout_secs,
            descriptor.description
        );
    }

    println!();
    if config.commands.allowed_shell_commands.is_empty() {
        println!("  Shell is disabled (commands.allowed_shell_commands is empty).");
    } else {
        println!(
            "  Shell allowlist: {}",
            config.commands.allowed_shell_commands.join(", ")
        );
    }
    println!("  Side-effecting commands need confirmation unless auto_approve is on.");

    Ok(())
}

fn side_effect_label(side_effect: SideEffect) -> &'static str {
    match side_effect {
        SideEffect::ReadOnly => "read-only",
        SideEffect::Filesystem => "filesystem",
        SideEffect::Network => "network",
        SideEffect::CodeExecution => "code-execution",
    }
}
