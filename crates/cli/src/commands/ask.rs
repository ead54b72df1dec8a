//! `tutorgate ask`: Run one message through the pipeline as a first-time
//! visitor and print the answer.
//!
//! The exchange is not written to the conversation log.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use tutorgate_agent::{ChatPipeline, ChatRequest, IncomingTurn, StreamFrame};
use tutorgate_core::message::TurnKind;
use tutorgate_knowledge::NoopLog;

pub async fn run(
    config_path: Option<&Path>,
    message: String,
    session: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    if super::report_missing_credentials(&config) > 0 {
        return Err("Cannot ask without credentials. See above for setup instructions.".into());
    }

    let mut backends = tutorgate_providers::build_from_config(&config);
    backends.log = Arc::new(NoopLog);
    let pipeline = ChatPipeline::from_backends(&backends, &config);

    let session = session.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let request = ChatRequest::new(
        session,
        vec![
            IncomingTurn {
                role: "assistant".into(),
                content: pipeline.settings().welcome_message.clone(),
                kind: Some(TurnKind::Welcome),
            },
            IncomingTurn::new("user", message),
        ],
    );

    let mut reply = pipeline.handle(&request).await?;
    eprintln!(
        "[trust: {} | top score: {} | {}]",
        reply.trust,
        reply
            .top_score
            .map(|s| format!("{s:.3}"))
            .unwrap_or_else(|| "none".into()),
        if reply.decision.is_blocked() { "blocked" } else { "allowed" }
    );

    let mut stdout = std::io::stdout();
    let mut finished = false;
    while let Some(frame) = reply.frames.recv().await {
        match frame {
            StreamFrame::Content(text) => {
                write!(stdout, "{text}")?;
                stdout.flush()?;
            }
            StreamFrame::Done => finished = true,
        }
    }
    writeln!(stdout)?;

    if !finished {
        return Err("The answer was cut off: generation failed mid-stream".into());
    }

    Ok(())
}
