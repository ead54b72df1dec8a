//! `tutorgate init`: Write a default config and a sample knowledge file.

use tutorgate_config::AppConfig;
use tutorgate_knowledge::seed::SAMPLE_KNOWLEDGE;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");
    let knowledge_path = config_dir.join("knowledge.toml");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("Created config directory: {}", config_dir.display());
    }

    if config_path.exists() {
        println!("Config already exists at: {}", config_path.display());
    } else {
        std::fs::write(&config_path, AppConfig::default_toml())?;
        println!("Created {}", config_path.display());
    }

    if knowledge_path.exists() {
        println!("Knowledge file already exists at: {}", knowledge_path.display());
    } else {
        std::fs::write(&knowledge_path, SAMPLE_KNOWLEDGE)?;
        println!("Created {}", knowledge_path.display());
    }

    println!("\nNext steps:");
    println!("  1. Set CHATGPT_API_KEY, SUPABASE_URL and SUPABASE_KEY (a .env file works)");
    println!("  2. Edit knowledge.toml, then run `tutorgate seed`");
    println!("  3. Run `tutorgate doctor`, then `tutorgate serve`");

    Ok(())
}
