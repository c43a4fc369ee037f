//! `colloquy backends` — List chat backends.

use colloquy_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let router = colloquy_providers::build_from_config(&config);

    println!("🤖 Chat Backends");
    println!("================");
    println!();
    println!("  Configured:");
    for name in router.list() {
        let marker = if name == config.default_backend {
            "  (default)"
        } else {
            ""
        };
        println!("    {name}{marker}");
    }
    println!();
    println!("  Known OpenAI-compatible endpoints:");
    println!("  ┌────────────┬────────────────────────────────┬──────────────┐");
    println!("  │ Backend    │ Base URL                       │ Auth         │");
    println!("  ├────────────┼────────────────────────────────┼──────────────┤");
    println!("  │ openai     │ api.openai.com/v1              │ API key      │");
    println!("  │ openrouter │ openrouter.ai/api/v1           │ API key      │");
    println!("  │ ollama     │ localhost:11434/v1             │ None (local) │");
    println!("  │ deepseek   │ api.deepseek.com/v1            │ API key      │");
    println!("  │ groq       │ api.groq.com/openai/v1         │ API key      │");
    println!("  │ together   │ api.together.xyz/v1            │ API key      │");
    println!("  │ fireworks  │ api.fireworks.ai/inference/v1  │ API key      │");
    println!("  │ vllm       │ localhost:8000/v1              │ None (local) │");
    println!("  └────────────┴────────────────────────────────┴──────────────┘");
    println!();
    println!("  Custom endpoints:");
    println!("    Any OpenAI-compatible API works out of the box:");
    println!("    [backends.mybox]");
    println!("    base_url = \"https://your-endpoint.example/v1\"");
    println!("    api_key = \"your-key\"");
    println!();
    println!("  Environment variables:");
    println!("    COLLOQUY_API_KEY, OPENROUTER_API_KEY, OPENAI_API_KEY");
    println!("    COLLOQUY_BACKEND, COLLOQUY_MODEL");

    Ok(())
}
