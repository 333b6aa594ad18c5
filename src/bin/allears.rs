//! `allears`: command-line client for the music-rating service.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use allears::client::{self, ApiClient};

#[derive(Parser, Debug)]
#[command(name = "allears", version)]
struct Args {
    /// Base URL of the web service.
    #[arg(long, env = "ALLEARS_URL")]
    url: String,

    /// Session token from the authentication service.
    #[arg(long, env = "ALLEARS_TOKEN")]
    token: Option<String>,

    /// Spotify access token for catalog lookups.
    #[arg(long, env = "SPOTIFY_TOKEN")]
    spotify_token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch a Spotify access token from the service.
    AccessToken,
    /// Search the catalog (type: artist, track, album, genre).
    Search { kind: String, query: String },
    /// Rate a track or album from 0 to 5 stars.
    Rate {
        musicid: String,
        stars: i64,
        #[arg(default_value = "")]
        comment: String,
    },
    /// List my ratings.
    Ratings,
    /// Show my rating stats.
    Stats,
    /// List my folders.
    Folders,
    /// Create an empty folder.
    CreateFolder { name: String },
    /// Add a track or album to a folder.
    AddToFolder { folderid: i64, musicid: String },
    /// Show a folder's contents.
    OpenFolder { folderid: i64 },
}

impl Args {
    fn token(&self) -> Result<&str> {
        self.token
            .as_deref()
            .context("no current token, please login (set --token or ALLEARS_TOKEN)")
    }

    fn spotify_token(&self) -> Result<&str> {
        self.spotify_token
            .as_deref()
            .context("no Spotify token (set --spotify-token or SPOTIFY_TOKEN)")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let api = ApiClient::new(&args.url);

    match &args.command {
        Command::AccessToken => println!("{}", api.access_token().await?),
        Command::Search { kind, query } => {
            let hits = api.search(kind, query, args.spotify_token()?).await?;
            print!("{}", client::render_search(&hits));
        }
        Command::Rate { musicid, stars, comment } => {
            api.create_rating(args.token()?, musicid, *stars, comment).await?;
            println!("Success! You've reviewed some music!");
        }
        Command::Ratings => {
            let ratings = api.ratings(args.token()?, args.spotify_token()?).await?;
            print!("{}", client::render_ratings(&ratings));
        }
        Command::Stats => match api.stats(args.token()?, args.spotify_token()?).await? {
            Some(stats) => print!("{}", client::render_stats(&stats)),
            None => println!("no ratings..."),
        },
        Command::Folders => {
            let folders = api.folders(args.token()?).await?;
            print!("{}", client::render_folders(&folders));
        }
        Command::CreateFolder { name } => {
            let id = api.create_folder(args.token()?, name).await?;
            println!("Success! You've made a new folder! (id {})", id);
        }
        Command::AddToFolder { folderid, musicid } => {
            api.add_to_folder(args.token()?, *folderid, musicid).await?;
            println!("Success! You've added a song to your folder!");
        }
        Command::OpenFolder { folderid } => {
            let contents = api
                .open_folder(args.token()?, args.spotify_token()?, *folderid)
                .await?;
            print!("{}", client::render_folder(&contents));
        }
    }

    Ok(())
}
