use std::{process::ExitCode, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    ControllerEvent, ControllerOptions, EventsController, HttpEventsApi, RequestFailure,
};
use serde_json::Value;
use shared::domain::Event;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "events", about = "List and create events on an events server")]
struct Args {
    #[arg(long, env = "EVENTS_SERVER_URL", default_value = "http://127.0.0.1:8080")]
    server_url: String,
    /// Delay before the follow-up refresh after a successful add.
    #[arg(long, default_value_t = 1000)]
    refresh_delay_ms: u64,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the events the server currently lists.
    List,
    /// Submit a new event, then print the list after each refresh.
    Add {
        #[arg(long)]
        title: Option<String>,
        /// Event date, YYYY-MM-DD.
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Extra draft field as key=value; JSON values are kept typed.
        #[arg(long = "field", value_parser = parse_field)]
        fields: Vec<(String, Value)>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let api = HttpEventsApi::new(&args.server_url)
        .with_context(|| format!("invalid server url '{}'", args.server_url))?;
    let options = ControllerOptions {
        refresh_delay: Duration::from_millis(args.refresh_delay_ms),
    };
    let controller = EventsController::start(Arc::new(api), options).await;
    if let Some(failure) = controller.current_alert().await {
        report(&failure);
        return Ok(ExitCode::FAILURE);
    }

    match args.command {
        Command::List => {
            print_events(&controller.events().await);
            Ok(ExitCode::SUCCESS)
        }
        Command::Add {
            title,
            date,
            location,
            description,
            fields,
        } => {
            let named = [
                ("title", title),
                ("date", date),
                ("location", location),
                ("description", description),
            ];
            for (field, value) in named {
                if let Some(value) = value {
                    controller.set_draft_field(field, value).await;
                }
            }
            for (field, value) in fields {
                controller.set_draft_field(field, value).await;
            }
            add_and_follow(&controller).await
        }
    }
}

async fn add_and_follow(controller: &EventsController) -> Result<ExitCode> {
    let mut updates = controller.subscribe();
    if let Err(failure) = controller.add_event().await {
        report(&failure);
        return Ok(ExitCode::FAILURE);
    }
    println!("event created");
    print_events(&controller.events().await);

    let wait = controller.options().refresh_delay + Duration::from_secs(5);
    match tokio::time::timeout(wait, next_listing(&mut updates)).await {
        Ok(Some(Ok(events))) => {
            println!("after delayed refresh:");
            print_events(&events);
            Ok(ExitCode::SUCCESS)
        }
        Ok(Some(Err(failure))) => {
            report(&failure);
            Ok(ExitCode::FAILURE)
        }
        Ok(None) | Err(_) => {
            tracing::warn!("delayed refresh did not report back");
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Waits for the delayed refresh, skipping updates already produced by the
/// immediate one.
async fn next_listing(
    updates: &mut broadcast::Receiver<ControllerEvent>,
) -> Option<Result<Vec<Event>, RequestFailure>> {
    let mut seen_immediate = false;
    loop {
        match updates.recv().await {
            Ok(ControllerEvent::EventsReplaced(events)) if seen_immediate => {
                return Some(Ok(events))
            }
            Ok(ControllerEvent::EventsReplaced(_)) => seen_immediate = true,
            Ok(ControllerEvent::Alert(failure)) if seen_immediate => return Some(Err(failure)),
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "controller updates lagged");
            }
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}

fn report(failure: &RequestFailure) {
    eprintln!("{failure}");
}

fn print_events(events: &[Event]) {
    if events.is_empty() {
        println!("(no upcoming events)");
        return;
    }
    for event in events {
        println!("{}", render_event(event));
    }
}

fn render_event(event: &Event) -> String {
    let Some(title) = event.text("title") else {
        return Value::Object(event.0.clone()).to_string();
    };

    let mut line = String::new();
    if let Some(date) = event.text("date") {
        line.push_str(date.split('T').next().unwrap_or(date));
        line.push_str("  ");
    }
    line.push_str(title);
    if let Some(location) = event.text("location") {
        line.push_str(" @ ");
        line.push_str(location);
    }
    if let Some(weather) = event
        .get("weather")
        .and_then(|w| w.get("description"))
        .and_then(Value::as_str)
    {
        line.push_str(&format!(" ({weather})"));
    }
    if let Some(description) = event.text("description").filter(|d| !d.is_empty()) {
        line.push_str(&format!("\n    {description}"));
    }
    line
}

fn parse_field(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty field name in '{raw}'"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::{parse_field, render_event};
    use serde_json::{json, Value};
    use shared::domain::Event;

    fn event(value: Value) -> Event {
        serde_json::from_value(value).expect("event")
    }

    #[test]
    fn parses_plain_and_json_field_values() {
        assert_eq!(
            parse_field("name=X").expect("field"),
            ("name".to_string(), json!("X"))
        );
        assert_eq!(
            parse_field("seats=300").expect("field"),
            ("seats".to_string(), json!(300))
        );
        assert_eq!(
            parse_field("note=a=b").expect("field"),
            ("note".to_string(), json!("a=b"))
        );
        assert!(parse_field("novalue").is_err());
        assert!(parse_field("=x").is_err());
    }

    #[test]
    fn renders_backend_event_on_one_line() {
        let rendered = render_event(&event(json!({
            "title": "Craft Conf",
            "date": "2099-04-26T00:00:00Z",
            "location": "Budapest",
            "description": "",
            "weather": { "description": "clear sky", "icon": "http://openweathermap.org/img/w/01d.png" }
        })));
        assert_eq!(rendered, "2099-04-26  Craft Conf @ Budapest (clear sky)");
    }

    #[test]
    fn renders_untitled_event_as_json() {
        let rendered = render_event(&event(json!({ "name": "X" })));
        assert_eq!(rendered, r#"{"name":"X"}"#);
    }
}
