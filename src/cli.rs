use clap::{Parser, Subcommand, ValueEnum};
use log::info;
use metatune::clients::errors::Result;
use metatune::clients::playbutton::{DEFAULT_TITLE, Theme, View};
use metatune::clients::{
    EntityKind, Item, MetadataClient, PlayButton, PlayButtonSettings, SpotifyItem, xml,
};

#[derive(Parser)]
#[command(name = "metatune")]
#[command(version, about = "Search and look up Spotify metadata", long_about = None)]
struct Cli {
    /// Output format
    #[arg(long, value_enum, global = true, default_value_t = Format::Text)]
    format: Format,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
    Xml,
}

#[derive(Clone, Copy, ValueEnum)]
enum Kind {
    Track,
    Artist,
    Album,
}

impl From<Kind> for EntityKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Track => EntityKind::Track,
            Kind::Artist => EntityKind::Artist,
            Kind::Album => EntityKind::Album,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Search tracks, artists or albums
    Search {
        kind: Kind,
        query: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Look up a track, artist or album by its identifier
    Lookup {
        uri: String,
        /// Include an artist's albums or an album's tracks
        #[arg(long)]
        detailed: bool,
    },
    /// Print the embed URL of a play button for the given tracks
    PlayButton {
        #[arg(required = true)]
        uris: Vec<String>,
        #[arg(long, default_value = DEFAULT_TITLE)]
        title: String,
        #[arg(long, default_value = "black")]
        theme: String,
        #[arg(long, default_value = "list")]
        view: String,
        #[arg(long, default_value_t = 250)]
        width: u32,
        #[arg(long, default_value_t = 330)]
        height: u32,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let mut client = MetadataClient::try_default()?;

    match cli.command {
        Commands::Search { kind, query, page } => {
            let items: Vec<Item> = match EntityKind::from(kind) {
                EntityKind::Track => into_items(client.search_track(&query, page)?),
                EntityKind::Artist => into_items(client.search_artist(&query, page)?),
                EntityKind::Album => into_items(client.search_album(&query, page)?),
            };
            info!("{} result(s) for {query:?}", items.len());
            print_items(&items, cli.format)
        }
        Commands::Lookup { uri, detailed } => {
            let item = client.lookup(&uri, detailed)?;
            print_items(std::slice::from_ref(&item), cli.format)
        }
        Commands::PlayButton {
            uris,
            title,
            theme,
            view,
            width,
            height,
        } => {
            let settings =
                PlayButtonSettings::new(theme.parse::<Theme>()?, view.parse::<View>()?, width, height)?;
            let tracks = uris
                .iter()
                .map(|uri| client.lookup_track(uri))
                .collect::<Result<Vec<_>>>()?;
            let source = client.play_button_source(&tracks, &title)?;
            println!("{}", PlayButton::new(settings).embed_url(&source));
            Ok(())
        }
    }
}

fn into_items<T: Into<Item>>(values: Vec<T>) -> Vec<Item> {
    values.into_iter().map(Into::into).collect()
}

fn print_items(items: &[Item], format: Format) -> Result<()> {
    match format {
        Format::Text => {
            for item in items {
                println!("{item}\t{}", item.url());
            }
        }
        Format::Json => {
            let json = serde_json::to_string_pretty(items)?;
            println!("{json}");
        }
        Format::Xml => match items {
            [] => info!("Nothing to print"),
            [item] => println!("{}", item.to_xml()?),
            items => println!("{}", xml::encode_items(items)?),
        },
    }
    Ok(())
}
