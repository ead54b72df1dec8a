//! `tutorgate doctor`: Check configuration and credentials.

use std::path::Path;

use tutorgate_config::AppConfig;
use tutorgate_core::provider::Provider;
use tutorgate_knowledge::KnowledgeFile;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("tutorgate doctor");
    println!("================\n");

    let mut issues = 0;

    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"));

    if !path.exists() {
        println!("  [warn] No config file at {} (defaults in use; run `tutorgate init`)", path.display());
    }

    let config = match AppConfig::load_with(config_path) {
        Ok(config) => {
            println!("  [ok]   Configuration valid");
            config
        }
        Err(e) => {
            println!("  [fail] {e}");
            println!("\n  1 issue found. Fix the config before running other checks.");
            return Ok(());
        }
    };

    let missing = config.missing_credentials();
    for name in ["CHATGPT_API_KEY", "SUPABASE_URL", "SUPABASE_KEY"] {
        if missing.contains(&name) {
            println!("  [fail] {name} is not set");
            issues += 1;
        } else {
            println!("  [ok]   {name} is set");
        }
    }

    if !missing.contains(&"CHATGPT_API_KEY") {
        let backends = tutorgate_providers::build_from_config(&config);
        match backends.generator.health_check().await {
            Ok(true) => println!("  [ok]   {} API reachable, key accepted", backends.generator.name()),
            Ok(false) => {
                println!("  [fail] {} API rejected the key", backends.generator.name());
                issues += 1;
            }
            Err(e) => {
                println!("  [fail] {} API unreachable: {e}", backends.generator.name());
                issues += 1;
            }
        }
    }

    let knowledge_path = AppConfig::config_dir().join("knowledge.toml");
    match KnowledgeFile::load(&knowledge_path) {
        Ok(file) => println!("  [ok]   {} knowledge chunks ready to seed", file.chunks.len()),
        Err(_) => println!("  [info] No knowledge file at {}", knowledge_path.display()),
    }

    println!(
        "  [info] Gate threshold {:.2}, top_k {}, history {} turns, logging {}",
        config.gate.confidence_threshold,
        config.retrieval.top_k,
        config.chat.history_limit,
        if config.logging.conversation_log { "on" } else { "off" }
    );

    println!();
    if issues == 0 {
        println!("  All checks passed.");
    } else {
        println!("  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
