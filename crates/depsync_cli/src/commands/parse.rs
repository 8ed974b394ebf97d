use std::sync::Arc;
use std::time::Duration;

use depsync::{parse_dependencies, ParseClient, ParseState, ReqwestTransport};
use uuid::Uuid;

use crate::config::Config;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Run one parse-cycle step for a single repository and report the resulting
/// state.
pub(crate) async fn handle_parse(
    config: &Config,
    database_url: &str,
    repo_id: Uuid,
) -> Result<(), Box<dyn std::error::Error>> {
    let db = depsync::connect(database_url).await?;

    let transport = Arc::new(ReqwestTransport::with_timeout(HTTP_TIMEOUT)?);
    let parser = ParseClient::new(config.services.parser_url.clone(), transport);

    parse_dependencies(&db, &parser, repo_id).await?;

    match depsync::repo::find_by_id(&db, repo_id).await? {
        Some(repo) => match repo.parse_state() {
            ParseState::NeverAttempted => {
                println!("{}: no parse attempt recorded", repo.full_name);
            }
            ParseState::Submitted { job_id } => {
                println!("{}: job {} outstanding", repo.full_name, job_id);
            }
            ParseState::Done { parsed_at } => {
                println!("{}: parsed at {}", repo.full_name, parsed_at);
            }
        },
        None => println!("Repository {} not found", repo_id),
    }

    Ok(())
}
