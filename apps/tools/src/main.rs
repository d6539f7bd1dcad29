use anyhow::{anyhow, Context, Result};
use chrono::{Datelike, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use serde_json::json;
use shared::domain::EventRecord;
use storage::Storage;

/// Month, day, title, location and description of the demo events.
const SAMPLE_EVENTS: [(u32, u32, &str, &str, &str); 3] = [
    (
        4,
        26,
        "Craft Conf",
        "Budapest",
        "CRAFT is about software craftsmanship, which tools, methods, practices should be part of the toolbox of a modern developer and company.",
    ),
    (
        5,
        28,
        "Google I/O",
        "Mountain View",
        "Google I/O is for developers - the creative coders who are building what's next. Each year, we explore the latest in tech, mobile & beyond.",
    ),
    (
        5,
        18,
        "GopherCon China",
        "Beijing",
        "GOPHER'S BIGGEST PARTY",
    ),
];

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://./data/events.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Insert the demo events, dated in `year` (next year by default).
    Seed {
        #[arg(long)]
        year: Option<i32>,
    },
    /// Print upcoming events the way the listing endpoint selects them.
    List,
    /// Insert one event after the same validation the POST endpoint applies.
    Add {
        title: String,
        /// Event date, YYYY-MM-DD.
        date: String,
        location: String,
        #[arg(long, default_value = "")]
        description: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url).await?;

    match cli.command {
        Command::Seed { year } => {
            let year = year.unwrap_or_else(|| Utc::now().year() + 1);
            for event in sample_events(year)? {
                let event_id = storage.insert_event(&event).await?;
                println!("created event_id={event_id} title={}", event.title);
            }
        }
        Command::List => {
            let upcoming = storage
                .list_upcoming_events(Utc::now(), server_api::LIST_LIMIT)
                .await?;
            if upcoming.is_empty() {
                println!("(no upcoming events)");
            }
            for stored in upcoming {
                println!(
                    "{} {} {} @ {}",
                    stored.event_id,
                    stored.date.format("%Y-%m-%d"),
                    stored.title,
                    stored.location
                );
            }
        }
        Command::Add {
            title,
            date,
            location,
            description,
        } => {
            let body = json!({
                "title": title,
                "date": date,
                "location": location,
                "description": description,
            });
            let event = server_api::decode_event(body.to_string().as_bytes())
                .map_err(|e| anyhow!("invalid event: {e}"))?;
            let event_id = storage.insert_event(&event).await?;
            println!("created event_id={event_id}");
        }
    }

    Ok(())
}

fn sample_events(year: i32) -> Result<Vec<EventRecord>> {
    SAMPLE_EVENTS
        .iter()
        .map(|&(month, day, title, location, description)| {
            let date = NaiveDate::from_ymd_opt(year, month, day)
                .with_context(|| format!("no {year}-{month:02}-{day:02} for {title}"))?;
            Ok(EventRecord {
                title: title.to_string(),
                description: description.to_string(),
                date: date.and_time(chrono::NaiveTime::MIN).and_utc(),
                location: location.to_string(),
                weather: None,
            })
        })
        .collect()
}
