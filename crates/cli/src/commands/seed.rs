//! `tutorgate seed`: Rebuild the knowledge base from a TOML file.

use std::path::{Path, PathBuf};

use tutorgate_config::AppConfig;
use tutorgate_knowledge::{KnowledgeFile, seed_knowledge};

pub async fn run(
    config_path: Option<&Path>,
    file: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    if super::report_missing_credentials(&config) > 0 {
        return Err("Cannot seed without credentials. See above for setup instructions.".into());
    }

    let path = file.unwrap_or_else(|| AppConfig::config_dir().join("knowledge.toml"));
    let knowledge = KnowledgeFile::load(&path)?;
    let chunks = knowledge.contents();

    if chunks.is_empty() {
        return Err(format!("No chunks found in {}", path.display()).into());
    }

    println!(
        "Seeding {} chunks from {} into '{}'...",
        chunks.len(),
        path.display(),
        config.supabase.knowledge_table
    );

    let backends = tutorgate_providers::build_from_config(&config);
    let report = seed_knowledge(
        backends.embedder.as_ref(),
        backends.writer.as_ref(),
        &config.model.embedding_model,
        &chunks,
    )
    .await?;

    println!("  Inserted: {}", report.inserted);
    if report.failed > 0 {
        println!("  Failed:   {} (see log output above)", report.failed);
    }

    Ok(())
}
