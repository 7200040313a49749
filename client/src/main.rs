use clap::Parser;
use client::{validate_name, ChatClient};
use log::info;
use tokio::io::{stdin, stdout, AsyncBufReadExt, AsyncWriteExt, BufReader};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:6969")]
    server: String,

    /// Display name; prompted for when omitted
    #[arg(short = 'n', long)]
    name: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let mut input = BufReader::new(stdin());

    let name = match args.name {
        Some(name) => name,
        None => {
            let mut out = stdout();
            out.write_all(b"Your name: ").await?;
            out.flush().await?;

            let mut name = String::new();
            input.read_line(&mut name).await?;
            name
        }
    };
    let name = validate_name(&name)?.to_string();

    info!("Connecting to: {}", args.server);
    let client = ChatClient::connect(&args.server, &name).await?;
    client.run(input, stdout()).await?;

    Ok(())
}
