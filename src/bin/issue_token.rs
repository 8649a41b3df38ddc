use chrono::Duration;
use clap::Parser;
use dotenvy::dotenv;
use markdown_import::config::ImportConfig;
use markdown_import::utils::auth::create_jwt;
use markdown_import::utils::validation::validate_owner_key;

/// Issues a session token accepted by the import endpoint.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Account that will own the imported articles
    #[arg(long)]
    owner_id: String,

    /// Blog the articles are attached to
    #[arg(long)]
    bucket_id: String,

    /// Key namespacing the import workspace (usually the user name)
    #[arg(long)]
    owner_key: String,

    /// Token lifetime in hours
    #[arg(long, default_value_t = 24)]
    hours: i64,
}

fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let args = Args::parse();

    validate_owner_key(&args.owner_key)?;

    let config = ImportConfig::from_env();
    let token = create_jwt(
        &args.owner_id,
        &args.bucket_id,
        &args.owner_key,
        &config.jwt_secret,
        Duration::hours(args.hours),
    )?;

    println!("{}", token);
    Ok(())
}
