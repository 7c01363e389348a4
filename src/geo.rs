//! Buyer city resolution
//!
//! A deterministic waterfall over the detected country, the URL's top-level domain and
//! a few fixed city pools. Every pool lookup indexes with `stable_hash(bare hostname)`,
//! so the same domain resolves to the same city on every run.

use tracing::info;
use url::Url;

use crate::domain_utils::{bare_hostname, hostname, top_level_domain};
use crate::hashing::stable_hash;

/// Static city pools keyed by country name
const COUNTRY_CITY_POOLS: &[(&str, &[&str])] = &[
    ("Netherlands", &["Amsterdam"]),
    ("Germany", &["Berlin", "Munich", "Hamburg"]),
    ("Denmark", &["Copenhagen"]),
    ("Sweden", &["Stockholm"]),
    ("Norway", &["Oslo"]),
    ("Finland", &["Helsinki"]),
    ("Spain", &["Madrid", "Barcelona"]),
    ("Italy", &["Milan", "Rome"]),
    (
        "USA",
        &[
            "New York City",
            "Los Angeles",
            "Chicago",
            "Houston",
            "Phoenix",
            "Philadelphia",
            "San Antonio",
            "San Diego",
            "Dallas",
            "Jacksonville",
        ],
    ),
    ("France", &["Paris", "Lyon", "Marseille", "Toulouse", "Bordeaux", "Lille"]),
    ("UK", &["London", "Manchester", "Birmingham"]),
    ("Singapore", &["Singapore"]),
    ("Canada", &["Toronto", "Vancouver", "Montreal"]),
    ("Australia", &["Sydney", "Melbourne"]),
];

/// Alternative spellings the classifier tends to return
const COUNTRY_ALIASES: &[(&str, &str)] = &[
    ("united states", "USA"),
    ("united states of america", "USA"),
    ("us", "USA"),
    ("united kingdom", "UK"),
    ("great britain", "UK"),
    ("england", "UK"),
    ("the netherlands", "Netherlands"),
];

/// ccTLDs that map to one fixed city
const CCTLD_CITIES: &[(&str, &str)] = &[
    ("nl", "Amsterdam"),
    ("de", "Berlin"),
    ("dk", "Copenhagen"),
    ("se", "Stockholm"),
    ("no", "Oslo"),
    ("fi", "Helsinki"),
    ("es", "Madrid"),
    ("it", "Milan"),
];

/// The one large country with its own ccTLD pool
const LARGE_COUNTRY_TLD: (&str, &str) = ("fr", "France");

/// Generic and commercial TLDs, resolved against the default large-country pool
const GENERIC_TLDS: &[&str] = &["com", "net", "org", "us", "io", "ai", "co", "biz"];

const DEFAULT_LARGE_COUNTRY: &str = "USA";

const GLOBAL_HUBS: &[&str] = &[
    "London",
    "Singapore",
    "Toronto",
    "Sydney",
    "New York City",
    "Berlin",
];

/// Static city pool for a country name (case-insensitive, with common aliases)
pub fn country_city_pool(country: &str) -> Option<&'static [&'static str]> {
    let wanted = country.trim();
    let canonical = COUNTRY_ALIASES
        .iter()
        .find(|(alias, _)| alias.eq_ignore_ascii_case(wanted))
        .map(|(_, name)| *name)
        .unwrap_or(wanted);

    COUNTRY_CITY_POOLS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(canonical))
        .map(|(_, pool)| *pool)
}

/// Which waterfall step produced the city
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CityStrategy {
    CountryPool,
    DynamicPool,
    CcTld,
    LargeCountryTld,
    GenericTld,
    GlobalHub,
}

impl std::fmt::Display for CityStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CityStrategy::CountryPool => "country_pool",
            CityStrategy::DynamicPool => "dynamic_pool",
            CityStrategy::CcTld => "cctld",
            CityStrategy::LargeCountryTld => "large_country_tld",
            CityStrategy::GenericTld => "generic_tld",
            CityStrategy::GlobalHub => "global_hub",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CityResolution {
    pub city: String,
    pub strategy: CityStrategy,
}

fn pick<S: AsRef<str>>(pool: &[S], hash: u32) -> Option<String> {
    if pool.is_empty() {
        return None;
    }
    Some(pool[hash as usize % pool.len()].as_ref().to_string())
}

/// Resolve the buyer city for a parsed target URL
pub fn resolve_city(
    url: &Url,
    detected_country: Option<&str>,
    dynamic_pool: Option<&[String]>,
) -> CityResolution {
    resolve_city_for_host(&hostname(url), detected_country, dynamic_pool)
}

/// Resolve the buyer city for a hostname. Never fails: the global hub pool is the
/// last step and always applies.
pub fn resolve_city_for_host(
    host: &str,
    detected_country: Option<&str>,
    dynamic_pool: Option<&[String]>,
) -> CityResolution {
    let bare = bare_hostname(host);
    let hash = stable_hash(bare);
    let tld = top_level_domain(bare);

    let detected_country = detected_country.map(str::trim).filter(|c| !c.is_empty());
    if let Some(country) = detected_country {
        if let Some(city) = country_city_pool(country).and_then(|pool| pick(pool, hash)) {
            info!(country = %country, strategy = "capital_or_major_hub", "City from detected country");
            return CityResolution {
                city,
                strategy: CityStrategy::CountryPool,
            };
        }
        if let Some(city) = dynamic_pool.and_then(|pool| pick(pool, hash)) {
            info!(country = %country, strategy = "dynamic_pool", "City from classifier city pool");
            return CityResolution {
                city,
                strategy: CityStrategy::DynamicPool,
            };
        }
    }

    if let Some(tld) = tld.as_deref() {
        if let Some((_, city)) = CCTLD_CITIES.iter().find(|(code, _)| *code == tld) {
            return CityResolution {
                city: city.to_string(),
                strategy: CityStrategy::CcTld,
            };
        }

        let (large_tld, large_country) = LARGE_COUNTRY_TLD;
        if tld == large_tld {
            if let Some(city) = country_city_pool(large_country).and_then(|pool| pick(pool, hash)) {
                return CityResolution {
                    city,
                    strategy: CityStrategy::LargeCountryTld,
                };
            }
        }

        if GENERIC_TLDS.contains(&tld) {
            if let Some(city) =
                country_city_pool(DEFAULT_LARGE_COUNTRY).and_then(|pool| pick(pool, hash))
            {
                return CityResolution {
                    city,
                    strategy: CityStrategy::GenericTld,
                };
            }
        }
    }

    CityResolution {
        city: GLOBAL_HUBS[hash as usize % GLOBAL_HUBS.len()].to_string(),
        strategy: CityStrategy::GlobalHub,
    }
}
