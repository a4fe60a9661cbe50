use anyhow::Result;

use crate::cli::output::{StatusInfo, get_formatter};
use crate::models::{Config, OutputFormat, VectorDriver};
use crate::remote::DocumentApiClient;
use crate::services::{HttpEmbedder, RunLog, create_index};

pub async fn handle_status(format: OutputFormat, _verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);

    let document_api_reachable = match DocumentApiClient::new(&config.extraction) {
        Ok(client) => client.health_check().await,
        Err(_) => false,
    };

    let (embedding_reachable, embedding_model) = match HttpEmbedder::new(&config.embedding) {
        Ok(embedder) => match embedder.health_check().await {
            Ok(health) => (true, health.model_id),
            Err(_) => (false, None),
        },
        Err(_) => (false, None),
    };

    let (index_connected, index_points) =
        match create_index(&config.vector_index, config.embedding.dimension).await {
            Ok(index) => {
                let connected = index.health_check().await.unwrap_or(false);
                let points = if connected {
                    index
                        .collection_info()
                        .await
                        .ok()
                        .flatten()
                        .map_or(0, |info| info.points_count)
                } else {
                    0
                };
                (connected, points)
            }
            Err(_) => (false, 0),
        };

    let runs = RunLog::from_config(&config.run_log)
        .map(|log| log.summary(config.run_log.retention_days));

    let status = StatusInfo {
        document_api_url: config.extraction.api_url.clone(),
        document_api_reachable,
        extraction_model: config.extraction.model.clone(),
        embedding_url: config.embedding.url.clone(),
        embedding_reachable,
        embedding_model,
        index_driver: config.vector_index.driver.to_string(),
        index_url: config.vector_index.url.clone(),
        index_connected,
        index_points,
        collection: config.vector_index.collection.clone(),
        runs,
    };

    print!("{}", formatter.format_status(&status));

    if !document_api_reachable || !embedding_reachable || !index_connected {
        eprintln!();
        if !document_api_reachable {
            eprintln!(
                "Warning: document API not reachable at {}.",
                config.extraction.api_url
            );
        }
        if !embedding_reachable {
            eprintln!(
                "Warning: embedding server not reachable at {}.",
                config.embedding.url
            );
        }
        if !index_connected {
            match config.vector_index.driver {
                VectorDriver::Qdrant => {
                    eprintln!(
                        "Warning: Qdrant not running. Start with: docker-compose up -d qdrant"
                    );
                }
                VectorDriver::Postgres => {
                    eprintln!("Warning: PostgreSQL not accessible. Check connection settings.");
                }
                VectorDriver::Memory => {}
            }
        }
    }

    Ok(())
}
