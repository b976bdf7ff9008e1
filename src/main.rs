//! Bucketline CLI entrypoint.
//!
//! Composes the session, client and workflow explicitly, then runs the
//! operation selected by the configuration.

use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;

use bucketline::bitbucket::{PagedResult, PullRequest};
use bucketline::logging::init_tracing;
use bucketline::{
    BitbucketClient, BitbucketError, BucketlineConfig, CreatePullRequestWorkflow,
    CredentialSession, EventBus, Git2RepositoryProvider, HttpGatewayFactory, Navigator,
    OperationMode, SubmitOutcome,
};
use ortho_config::OrthoConfig;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Bitbucket(#[from] BitbucketError),
    #[error("{0}")]
    Workflow(String),
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            if writeln!(io::stderr().lock(), "{error}").is_err() {
                return ExitCode::FAILURE;
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), CliError> {
    let config = load_config()?;
    init_tracing(&config.log_filter).map_err(|error| BitbucketError::Configuration {
        message: error.to_string(),
    })?;

    let events = Arc::new(EventBus::new());
    let factory = Arc::new(HttpGatewayFactory::new(config.retry_policy()));
    let session = Arc::new(CredentialSession::new(factory, Arc::clone(&events)));
    session.login(config.credentials()?).await?;
    let client = BitbucketClient::new(Arc::clone(&session));

    let result = match config.operation_mode() {
        OperationMode::ListRepositories => list_repositories(&client).await,
        OperationMode::ListPullRequests => list_pull_requests(&client, &config).await,
        OperationMode::CreatePullRequest => create_pull_request(client, &config).await,
    };

    session.logout();
    events.clear();
    result
}

/// Loads configuration from CLI, environment, and files.
///
/// # Errors
///
/// Returns [`BitbucketError::Configuration`] when ortho-config fails to parse
/// arguments or load configuration files.
fn load_config() -> Result<BucketlineConfig, BitbucketError> {
    BucketlineConfig::load().map_err(|error| BitbucketError::Configuration {
        message: error.to_string(),
    })
}

async fn list_repositories(client: &BitbucketClient) -> Result<(), CliError> {
    let repositories = client.all_repositories().await?;
    let mut lines = Vec::with_capacity(repositories.len());
    for repository in &repositories {
        let clone_url = repository.clone_url.as_deref().unwrap_or("-");
        lines.push(format!(
            "{}/{}\t{clone_url}",
            repository.owner, repository.name
        ));
    }
    write_lines(&lines)
}

async fn list_pull_requests(
    client: &BitbucketClient,
    config: &BucketlineConfig,
) -> Result<(), CliError> {
    let repo = config.require_repository()?;
    let page = client
        .pull_requests(&repo, config.per_page, config.page)
        .await?;
    write_lines(&pull_request_lines(&page))
}

fn pull_request_lines(page: &PagedResult<PullRequest>) -> Vec<String> {
    let mut lines: Vec<String> = page
        .items
        .iter()
        .map(|pull_request| {
            let state = pull_request.state.map_or("UNKNOWN", |state| state.as_str());
            format!(
                "#{} [{state}] {} ({} -> {})",
                pull_request.id,
                pull_request.title,
                pull_request.source_branch,
                pull_request.destination_branch
            )
        })
        .collect();
    let info = page.page_info;
    let footer = info.total_pages().map_or_else(
        || format!("page {}", info.current_page()),
        |total| format!("page {} of {total}", info.current_page()),
    );
    lines.push(footer);
    lines
}

struct CliNavigator;

impl Navigator for CliNavigator {
    fn navigate_back(&self, success: bool) {
        debug!(success, "pull request form closed");
    }
}

async fn create_pull_request(
    client: BitbucketClient,
    config: &BucketlineConfig,
) -> Result<(), CliError> {
    let mut workflow = CreatePullRequestWorkflow::new(
        Arc::new(client),
        Arc::new(Git2RepositoryProvider::new(".")),
        Arc::new(CliNavigator),
    );
    if !workflow.reload().await {
        let message = workflow
            .error_message()
            .unwrap_or("branches could not be loaded");
        return Err(CliError::Workflow(message.to_owned()));
    }

    if let Some(destination) = config.destination.as_deref()
        && !workflow.set_destination_branch(destination)
    {
        return Err(CliError::Workflow(format!(
            "destination branch {destination} does not exist on Bitbucket"
        )));
    }
    workflow.set_title(config.title.clone().unwrap_or_default());
    workflow.set_description(config.description.clone().unwrap_or_default());
    workflow.set_close_source_branch(config.close_source_branch);

    if let Some(warning) = workflow.warning() {
        let rendered = warning.to_string();
        writeln!(io::stderr().lock(), "{rendered}").map_err(|error| io_error(&error))?;
    }

    match workflow.submit().await {
        Some(SubmitOutcome::Completed(created)) => write_lines(&[format!(
            "Created pull request #{}: {} ({} -> {})",
            created.id, created.title, created.source_branch, created.destination_branch
        )]),
        Some(SubmitOutcome::Failed(message)) => Err(CliError::Workflow(message)),
        None => Err(CliError::Workflow(
            "pull request cannot be submitted: check the title and that the current branch \
             tracks a remote branch other than the destination"
                .to_owned(),
        )),
    }
}

fn io_error(error: &io::Error) -> CliError {
    CliError::Bitbucket(BitbucketError::Io {
        message: error.to_string(),
    })
}

fn write_lines(lines: &[String]) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    for line in lines {
        writeln!(stdout, "{line}").map_err(|error| io_error(&error))?;
    }
    Ok(())
}
