use crate::config::Settings;
use crate::domain::pricing::{EventSignal, Location, Popularity};
use crate::pricing::features::NO_EVENT_DISTANCE_KM;
use crate::pricing::math::{haversine_km, round_dp};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://app.ticketmaster.com/discovery/v2/events.json";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const MAX_EVENTS: usize = 10;

pub const DEFAULT_RADIUS_KM: f64 = 10.0;

#[derive(Debug, Clone)]
pub struct EventObservation {
    pub signal: EventSignal,
    pub raw: Value,
}

#[async_trait::async_trait]
pub trait EventsProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn fetch_nearby(&self, location: Location, radius_km: f64)
        -> Result<Vec<EventObservation>>;
}

#[derive(Debug, Clone)]
pub struct TicketmasterClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl TicketmasterClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let api_key = settings.require_ticketmaster_api_key()?.to_string();

        let base_url = std::env::var("TICKETMASTER_BASE_URL")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let timeout_secs = std::env::var("TICKETMASTER_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build events http client")?;

        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }
}

#[async_trait::async_trait]
impl EventsProvider for TicketmasterClient {
    fn provider_name(&self) -> &'static str {
        "Ticketmaster"
    }

    async fn fetch_nearby(
        &self,
        location: Location,
        radius_km: f64,
    ) -> Result<Vec<EventObservation>> {
        let radius = radius_km.max(1.0) as u32;
        let res = self
            .http
            .get(&self.base_url)
            .query(&[
                ("apikey", self.api_key.clone()),
                ("latlong", format!("{},{}", location.lat, location.lon)),
                ("radius", radius.to_string()),
                ("unit", "km".to_string()),
                ("size", MAX_EVENTS.to_string()),
                ("sort", "date,asc".to_string()),
            ])
            .send()
            .await
            .context("events request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read events response")?;
        let raw = serde_json::from_str::<Value>(&text)
            .with_context(|| format!("events response is not valid JSON: {text}"))?;

        if !status.is_success() {
            anyhow::bail!("events provider HTTP {status}: {raw}");
        }

        Ok(parse_events(&raw, location))
    }
}

#[derive(Debug, Default, Deserialize)]
struct TmEvent {
    #[serde(default)]
    name: Option<String>,
    #[serde(rename = "_embedded", default)]
    embedded: Option<TmEventEmbedded>,
    #[serde(default)]
    classifications: Vec<TmClassification>,
    #[serde(default)]
    dates: Option<TmDates>,
}

#[derive(Debug, Default, Deserialize)]
struct TmEventEmbedded {
    #[serde(default)]
    venues: Vec<TmVenue>,
}

#[derive(Debug, Deserialize)]
struct TmVenue {
    #[serde(default)]
    location: Option<TmLocation>,
}

#[derive(Debug, Deserialize)]
struct TmLocation {
    #[serde(default)]
    latitude: Option<String>,
    #[serde(default)]
    longitude: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TmClassification {
    #[serde(default)]
    segment: Option<TmNamed>,
}

#[derive(Debug, Deserialize)]
struct TmNamed {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct TmDates {
    #[serde(default)]
    start: Option<TmStart>,
}

#[derive(Debug, Deserialize)]
struct TmStart {
    #[serde(rename = "dateTime", default)]
    date_time: Option<DateTime<Utc>>,
}

fn parse_events(raw: &Value, origin: Location) -> Vec<EventObservation> {
    let items = raw
        .pointer("/_embedded/events")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut out = Vec::new();
    for item in items.into_iter().take(MAX_EVENTS) {
        let event = match serde_json::from_value::<TmEvent>(item.clone()) {
            Ok(event) => event,
            Err(err) => {
                tracing::warn!(error = %err, "skipping unparseable event");
                continue;
            }
        };

        let distance_km = event
            .embedded
            .as_ref()
            .and_then(|e| e.venues.first())
            .map(|venue| venue_distance_km(venue, origin))
            .unwrap_or(NO_EVENT_DISTANCE_KM);

        let segment = event
            .classifications
            .first()
            .and_then(|c| c.segment.as_ref())
            .map(|s| s.name.as_str())
            .unwrap_or_default();

        out.push(EventObservation {
            signal: EventSignal {
                name: event.name.clone().unwrap_or_default(),
                popularity: popularity_for_segment(segment),
                distance_km,
                starts_at: event.dates.and_then(|d| d.start).and_then(|s| s.date_time),
            },
            raw: item,
        });
    }
    out
}

/// Distance from `origin` to the venue; coordinates the venue lacks default to the origin's.
fn venue_distance_km(venue: &TmVenue, origin: Location) -> f64 {
    let coord = |v: Option<&String>, fallback: f64| {
        v.and_then(|s| s.trim().parse::<f64>().ok())
            .unwrap_or(fallback)
    };
    let loc = venue.location.as_ref();
    let lat = coord(loc.and_then(|l| l.latitude.as_ref()), origin.lat);
    let lon = coord(loc.and_then(|l| l.longitude.as_ref()), origin.lon);
    round_dp(haversine_km(origin.lat, origin.lon, lat, lon), 2)
}

fn popularity_for_segment(segment: &str) -> Popularity {
    match segment {
        "Sports" | "Music" => Popularity::High,
        _ => Popularity::Medium,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const MUMBAI: Location = Location {
        lat: 19.0760,
        lon: 72.8777,
    };

    #[test]
    fn maps_segment_distance_and_start() {
        let raw = json!({
            "_embedded": {"events": [
                {
                    "name": "Cricket Final",
                    "classifications": [{"segment": {"name": "Sports"}}],
                    "dates": {"start": {"dateTime": "2026-03-01T14:00:00Z"}},
                    "_embedded": {"venues": [{"location": {"latitude": "19.0760", "longitude": "72.8777"}}]}
                },
                {
                    "name": "Art Fair",
                    "classifications": [{"segment": {"name": "Arts & Theatre"}}],
                    "_embedded": {"venues": [{"location": {"latitude": "19.1760", "longitude": "72.8777"}}]}
                }
            ]}
        });

        let events = parse_events(&raw, MUMBAI);
        assert_eq!(events.len(), 2);

        let cricket = &events[0].signal;
        assert_eq!(cricket.name, "Cricket Final");
        assert_eq!(cricket.popularity, Popularity::High);
        assert_eq!(cricket.distance_km, 0.0);
        assert!(cricket.starts_at.is_some());

        let fair = &events[1].signal;
        assert_eq!(fair.popularity, Popularity::Medium);
        assert_eq!(fair.distance_km, 11.12);
        assert!(fair.starts_at.is_none());
    }

    #[test]
    fn event_without_venue_is_far_away() {
        let raw = json!({"_embedded": {"events": [{"name": "Mystery Gig"}]}});
        let events = parse_events(&raw, MUMBAI);
        assert_eq!(events[0].signal.distance_km, 999.0);
        assert_eq!(events[0].signal.popularity, Popularity::Medium);
    }

    #[test]
    fn empty_or_missing_listing_yields_nothing() {
        assert!(parse_events(&json!({"page": {"totalElements": 0}}), MUMBAI).is_empty());
        assert!(parse_events(&json!({"_embedded": {}}), MUMBAI).is_empty());
    }

    #[test]
    fn keeps_at_most_ten_events() {
        let items: Vec<_> = (0..15).map(|i| json!({"name": format!("E{i}")})).collect();
        let raw = json!({"_embedded": {"events": items}});
        assert_eq!(parse_events(&raw, MUMBAI).len(), 10);
    }
}
