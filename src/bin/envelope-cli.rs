use clap::{Parser, Subcommand};
use envelope_server::client::{EnvelopeClient, EnvelopeRequest};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "envelope-cli")]
#[command(about = "Send envelope requests to an envelope server", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Call a path, optionally with an action
    Call {
        /// Route path, e.g. /api/userinfo
        #[arg(short, long)]
        path: String,

        /// Body action; omit for no-action paths
        #[arg(short, long)]
        action: Option<String>,

        /// Handler payload as a JSON object
        #[arg(long, default_value = "{}")]
        payload: String,

        /// Request id (a UUID is generated otherwise)
        #[arg(long)]
        request_id: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = EnvelopeClient::new(&cli.url);

    match cli.command {
        Commands::Call {
            path,
            action,
            payload,
            request_id,
        } => {
            let payload: Value = serde_json::from_str(&payload)?;
            let mut request = EnvelopeRequest::new(path).payload(payload)?;
            request.action = action;
            request.request_id = request_id;

            let envelope = client.call(&request).await?;
            if !envelope.is_success() {
                eprintln!("Error {}: {}", envelope.err_code, envelope.err_msg);
            }
            println!("{}", serde_json::to_string_pretty(&envelope)?);
        }
    }

    Ok(())
}
