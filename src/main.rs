//! Replays a script of intents against a session served from a fixture.
//!
//! Usage: `task-annotator-replay <fixture.json> <script.json>`
//!
//! The script is a JSON array whose items are either intents
//! (`{"intent": "create", ...}`) or backend actions
//! (`{"action": "save"}`, `"save_edit"`, `"finish"`, `"reload"`).
//! The resulting annotation state is printed as JSON.

use std::process::ExitCode;

use serde::Deserialize;
use task_annotator::backend::{Fixture, InMemoryBackend};
use task_annotator::config::EngineConfig;
use task_annotator::intent::Intent;
use task_annotator::session::{AnnotatorSession, LoadSource};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Action {
    Save,
    SaveEdit,
    Finish,
    Reload,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Step {
    Action { action: Action },
    Intent(Intent),
}

fn main() -> ExitCode {
    let config = EngineConfig::load_from_default_path().unwrap_or_default();
    env_logger::Builder::new()
        .filter_level(config.log_level.to_level_filter())
        .parse_default_env()
        .init();

    let args: Vec<String> = std::env::args().collect();
    let (Some(fixture_path), Some(script_path)) = (args.get(1), args.get(2)) else {
        eprintln!("Usage: task-annotator-replay <fixture.json> <script.json>");
        return ExitCode::FAILURE;
    };

    match pollster::block_on(run(fixture_path, script_path, config)) {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Replay error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(
    fixture_path: &str,
    script_path: &str,
    config: EngineConfig,
) -> Result<String, Box<dyn std::error::Error>> {
    let fixture = Fixture::from_json(&std::fs::read_to_string(fixture_path)?)?;
    let steps: Vec<Step> = serde_json::from_str(&std::fs::read_to_string(script_path)?)?;

    let source = match (fixture.tasks.first(), &fixture.document) {
        (Some(task), _) => LoadSource::Task(task.id),
        (None, Some(document)) => LoadSource::Job {
            job_id: 0,
            file_id: document.id,
            revision: None,
        },
        (None, None) => return Err("fixture has neither a task nor a document".into()),
    };

    let backend = InMemoryBackend::new(fixture);
    let mut session = AnnotatorSession::load(&backend, source, config).await?;
    log::info!("Replaying {} step(s)", steps.len());

    for step in steps {
        match step {
            Step::Intent(intent) => session.dispatch(intent),
            Step::Action { action } => {
                let outcome = match action {
                    Action::Save => format!("{:?}", session.save_task(&backend).await?),
                    Action::SaveEdit => format!("{:?}", session.save_edit(&backend).await?),
                    Action::Finish => format!("{:?}", session.finish_task(&backend).await?),
                    Action::Reload => {
                        session.reload(&backend).await?;
                        "Reloaded".to_string()
                    }
                };
                log::info!("{:?}: {}", action, outcome);
            }
        }
    }

    let output = serde_json::json!({
        "revision": session.revision(),
        "pages": session.all_annotations(),
        "validity": session.validity(),
    });
    Ok(serde_json::to_string_pretty(&output)?)
}
