use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use pet_report_client::{
    ClientConfig, Gateway, GatewayError, MemorySessionStore, Outcome, SessionCredential,
};
use reqwest::multipart::{Form, Part};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "pet-report-cli")]
#[command(about = "Command line client for the pet missing report backend", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:5000")]
    url: String,

    /// Bearer token of a signed-in user.
    #[arg(short, long)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the backend is up
    Status,
    /// GET a path, e.g. /v1/users/reports
    Get { path: String },
    /// POST a JSON document to a path
    Post {
        path: String,
        /// Request body as a JSON string
        #[arg(short, long, default_value = "{}")]
        data: String,
    },
    /// Upload a file as multipart form data
    Upload {
        path: String,
        file: PathBuf,
        /// Form field name of the file
        #[arg(short, long, default_value = "file")]
        field: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let mut builder = Gateway::builder(ClientConfig::new(&cli.url)?);
    if let Some(token) = &cli.token {
        let store = Arc::new(MemorySessionStore::new());
        SessionCredential::signed_in(token.as_str()).persist(store.as_ref());
        builder = builder.session_store(store);
    }
    let gateway = builder.build();

    let result = match cli.command {
        Commands::Status => gateway.get_request("/").await,
        Commands::Get { path } => gateway.get_request(&path).await,
        Commands::Post { path, data } => {
            let payload: Value = serde_json::from_str(&data)?;
            gateway.post_request(&path, payload).await
        }
        Commands::Upload { path, file, field } => {
            let bytes = tokio::fs::read(&file).await?;
            let file_name = file
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "upload".to_string());
            let form = Form::new().part(field, Part::bytes(bytes).file_name(file_name));
            gateway.post_file_request(&path, form).await
        }
    };

    print_outcome(result)
}

fn print_outcome(result: Result<Outcome, GatewayError>) -> Result<(), Box<dyn std::error::Error>> {
    match result {
        Ok(Outcome::Resolved(body)) => {
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Ok(Outcome::SessionExpired) => {
            eprintln!("Session expired. Sign in again and pass a fresh --token.");
        }
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
    Ok(())
}
