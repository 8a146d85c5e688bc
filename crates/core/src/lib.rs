pub mod domain;
pub mod ingest;
pub mod pricing;
pub mod service;
pub mod storage;

pub mod config {
    use anyhow::Context;
    use std::path::PathBuf;

    use crate::domain::pricing::Location;
    use crate::pricing::PricingConfig;

    const DEFAULT_COEFFS_PATH: &str = "./ml_coeffs.json";
    const DEFAULT_LAT: f64 = 19.0760;
    const DEFAULT_LON: f64 = 72.8777;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub sentry_dsn: Option<String>,
        pub owm_api_key: Option<String>,
        pub ticketmaster_api_key: Option<String>,
        pub coefficients_path: PathBuf,
        pub default_location: Location,
        pub pricing: PricingConfig,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Self::from_vars(|key| std::env::var(key).ok())
        }

        pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
            let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

            let default_location = Location {
                lat: parse_var(&lookup, "DEFAULT_LAT")?.unwrap_or(DEFAULT_LAT),
                lon: parse_var(&lookup, "DEFAULT_LON")?.unwrap_or(DEFAULT_LON),
            };
            default_location
                .validate()
                .context("DEFAULT_LAT/DEFAULT_LON are out of range")?;

            Ok(Self {
                database_url: non_empty("DATABASE_URL"),
                sentry_dsn: non_empty("SENTRY_DSN"),
                owm_api_key: non_empty("OWM_API_KEY"),
                ticketmaster_api_key: non_empty("TICKETMASTER_API_KEY"),
                coefficients_path: non_empty("ML_COEFFS_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_COEFFS_PATH)),
                default_location,
                pricing: PricingConfig::from_vars(&lookup)?,
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }

        pub fn require_owm_api_key(&self) -> anyhow::Result<&str> {
            self.owm_api_key
                .as_deref()
                .context("OWM_API_KEY is required")
        }

        pub fn require_ticketmaster_api_key(&self) -> anyhow::Result<&str> {
            self.ticketmaster_api_key
                .as_deref()
                .context("TICKETMASTER_API_KEY is required")
        }
    }

    /// Reads an optional env value and parses it, naming the variable on failure.
    pub(crate) fn parse_var<T>(
        lookup: impl Fn(&str) -> Option<String>,
        key: &str,
    ) -> anyhow::Result<Option<T>>
    where
        T: std::str::FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        let Some(raw) = lookup(key).filter(|v| !v.trim().is_empty()) else {
            return Ok(None);
        };
        let parsed = raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("invalid value for {key}: {raw:?}"))?;
        Ok(Some(parsed))
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use std::collections::HashMap;

        fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        }

        #[test]
        fn defaults_when_environment_is_empty() {
            let env = vars(&[]);
            let s = Settings::from_vars(|k| env.get(k).cloned()).unwrap();
            assert_eq!(s.coefficients_path, PathBuf::from("./ml_coeffs.json"));
            assert_eq!(s.default_location.lat, 19.0760);
            assert_eq!(s.default_location.lon, 72.8777);
            assert!(s.owm_api_key.is_none());
            assert_eq!(s.pricing, PricingConfig::default());
            assert!(s.require_database_url().is_err());
        }

        #[test]
        fn blank_keys_count_as_missing() {
            let env = vars(&[("OWM_API_KEY", "  "), ("TICKETMASTER_API_KEY", "tm")]);
            let s = Settings::from_vars(|k| env.get(k).cloned()).unwrap();
            assert!(s.owm_api_key.is_none());
            assert_eq!(s.require_ticketmaster_api_key().unwrap(), "tm");
        }

        #[test]
        fn rejects_unparseable_location() {
            let env = vars(&[("DEFAULT_LAT", "north")]);
            let err = Settings::from_vars(|k| env.get(k).cloned()).unwrap_err();
            assert!(format!("{err:#}").contains("DEFAULT_LAT"));
        }

        #[test]
        fn rejects_out_of_range_location() {
            let env = vars(&[("DEFAULT_LAT", "123.0")]);
            assert!(Settings::from_vars(|k| env.get(k).cloned()).is_err());
        }
    }
}
