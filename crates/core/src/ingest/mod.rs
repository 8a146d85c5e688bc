pub mod events;
pub mod weather;

use crate::config::Settings;
use crate::domain::pricing::{EventSignal, Location, WeatherReading};
use anyhow::Result;
use events::{EventObservation, EventsProvider, TicketmasterClient};
use std::sync::Arc;
use weather::{OpenWeatherMapClient, WeatherObservation, WeatherProvider};

/// External signal sources. A missing provider means that signal is never fetched.
#[derive(Clone, Default)]
pub struct SignalProviders {
    pub weather: Option<Arc<dyn WeatherProvider>>,
    pub events: Option<Arc<dyn EventsProvider>>,
}

impl SignalProviders {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let weather: Option<Arc<dyn WeatherProvider>> = match settings.owm_api_key {
            Some(_) => Some(Arc::new(OpenWeatherMapClient::from_settings(settings)?)),
            None => None,
        };
        let events: Option<Arc<dyn EventsProvider>> = match settings.ticketmaster_api_key {
            Some(_) => Some(Arc::new(TicketmasterClient::from_settings(settings)?)),
            None => None,
        };
        Ok(Self { weather, events })
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResolvedSignals {
    pub weather: Option<WeatherReading>,
    pub events: Vec<EventSignal>,
    /// Observations fetched during resolution, kept for snapshotting.
    pub fetched_weather: Option<(&'static str, WeatherObservation)>,
    pub fetched_events: Option<(&'static str, Vec<EventObservation>)>,
}

/// Caller-supplied signals win; otherwise the providers are asked. Provider failures degrade to
/// "no signal" and are only logged.
pub async fn resolve_signals(
    providers: &SignalProviders,
    location: Location,
    supplied_weather: Option<WeatherReading>,
    supplied_events: Option<Vec<EventSignal>>,
) -> ResolvedSignals {
    let mut out = ResolvedSignals::default();

    match (supplied_weather, providers.weather.as_ref()) {
        (Some(w), _) => out.weather = Some(w),
        (None, Some(provider)) => match provider.fetch_current(location).await {
            Ok(Some(obs)) => {
                out.weather = Some(obs.reading.clone());
                out.fetched_weather = Some((provider.provider_name(), obs));
            }
            Ok(None) => {
                tracing::debug!(
                    provider = provider.provider_name(),
                    "no temperature in weather response"
                );
            }
            Err(err) => {
                tracing::warn!(
                    provider = provider.provider_name(),
                    error = %err,
                    "weather fetch failed; pricing without weather"
                );
            }
        },
        (None, None) => {}
    }

    match (supplied_events, providers.events.as_ref()) {
        (Some(events), _) => out.events = events,
        (None, Some(provider)) => {
            match provider
                .fetch_nearby(location, events::DEFAULT_RADIUS_KM)
                .await
            {
                Ok(observations) => {
                    out.events = observations.iter().map(|o| o.signal.clone()).collect();
                    out.fetched_events = Some((provider.provider_name(), observations));
                }
                Err(err) => {
                    tracing::warn!(
                        provider = provider.provider_name(),
                        error = %err,
                        "events fetch failed; pricing without events"
                    );
                }
            }
        }
        (None, None) => {}
    }

    out
}
