//! Fetch command - retrieve a single resource into the file store.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use clap::Args;
use globestream::retrieval::{Priority, RetrievalOutcome, DEFAULT_CONNECT_TIMEOUT};
use globestream::retrievers::{default_http_client, HttpRetriever};
use globestream::store::FileStore;

use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the fetch command.
#[derive(Debug, Args)]
pub struct FetchArgs {
    /// URL to retrieve
    pub url: String,

    /// Store key for the fetched bytes (defaults to the URL path)
    #[arg(long)]
    pub key: Option<String>,
}

/// Run the fetch command.
pub fn run(args: FetchArgs) -> Result<(), CliError> {
    globestream::panic::install_panic_hook();

    let runner = CliRunner::new()?;
    runner.log_startup("fetch");
    let config = runner.config();

    let key = match &args.key {
        Some(key) => key.clone(),
        None => key_from_url(&args.url)?,
    };

    let store = FileStore::from_config(&config.file_store_config())?;

    println!("Fetching:");
    println!("  URL: {}", args.url);
    println!("  Key: {}", key);
    println!();

    let runtime = tokio::runtime::Runtime::new().map_err(CliError::Runtime)?;

    let start = Instant::now();
    let bytes = runtime.block_on(retrieve(&runner, &key, &args.url))?;
    let elapsed = start.elapsed();
    println!(
        "Retrieved {} bytes in {:.2}s",
        bytes.len(),
        elapsed.as_secs_f64()
    );

    let path = store.write(&key, &bytes)?;
    println!("Stored: {}", path.display());

    Ok(())
}

/// Run one retrieval to completion, then drain the service.
async fn retrieve(runner: &CliRunner, key: &str, url: &str) -> Result<Bytes, CliError> {
    let service = runner.start_service()?;
    let client = default_http_client(DEFAULT_CONNECT_TIMEOUT)?;
    let retriever = Arc::new(HttpRetriever::new(client, key, url));

    let mut future = service.run_retriever(retriever, Priority::ON_DEMAND)?;
    let outcome = future.wait().await;

    service.shutdown(false);
    service.join().await;

    match outcome {
        RetrievalOutcome::Complete(Some(bytes)) => Ok(bytes),
        // Only a post-processor can consume the payload, and fetch attaches none.
        RetrievalOutcome::Complete(None) => Ok(Bytes::new()),
        RetrievalOutcome::Failed(error) => Err(CliError::Retrieval(error)),
        RetrievalOutcome::Cancelled => Err(CliError::Cancelled),
    }
}

/// Derive a store key from the URL path.
fn key_from_url(url: &str) -> Result<String, CliError> {
    let after_scheme = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    let path = after_scheme
        .split_once('/')
        .map(|(_, path)| path)
        .unwrap_or("");
    let path = match path.split_once(['?', '#']) {
        Some((path, _)) => path,
        None => path,
    };

    let key = path.trim_matches('/').to_string();
    if key.is_empty() {
        return Err(CliError::InvalidArgument(format!(
            "cannot derive a store key from '{}'; pass --key",
            url
        )));
    }
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_from_url_uses_path() {
        let key = key_from_url("https://tiles.example.com/imagery/9/14/7.jpg").unwrap();
        assert_eq!(key, "imagery/9/14/7.jpg");
    }

    #[test]
    fn test_key_from_url_strips_query_and_fragment() {
        let key = key_from_url("https://tiles.example.com/a/b.png?token=x#frag").unwrap();
        assert_eq!(key, "a/b.png");
    }

    #[test]
    fn test_key_from_url_without_path_rejected() {
        assert!(key_from_url("https://tiles.example.com").is_err());
        assert!(key_from_url("https://tiles.example.com/").is_err());
    }
}
