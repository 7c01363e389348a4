//! On-disk format and expiry of the analysis result cache

use spades_icp::config::CacheConfig;
use spades_icp::model::{AnalysisResult, CompanyProfile, IcpPersona, MarketData, ValueHook};
use spades_icp::result_cache::ResultCache;
use std::time::Duration;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

fn result(name: &str) -> AnalysisResult {
    AnalysisResult {
        company_profile: CompanyProfile {
            name: name.to_string(),
            tagline: "Tagline".to_string(),
            domain: "www.acme.com".to_string(),
            primary_color: "#ea580c".to_string(),
            industry_tag: "SaaS".to_string(),
            summary: "Summary".to_string(),
            logo_prompt: "Minimalist logo".to_string(),
            generated_logo: "https://acme.com/logo.png".to_string(),
            hero_image: "https://acme.com/hero.jpg".to_string(),
        },
        icp_persona: IcpPersona {
            name: "Dana".to_string(),
            role: "VP Sales".to_string(),
            avatar_id: "https://cdn.example.com/dana.png".to_string(),
            bio_snack: "Bio".to_string(),
            pain_points: vec!["Forecast accuracy".to_string()],
            location: "Chicago".to_string(),
            company_size: "200-500".to_string(),
            interests: vec![],
            preferred_channel: vec!["LinkedIn".to_string()],
            avoid_channel: vec![],
        },
        value_hook: ValueHook::default(),
        market_data: MarketData { total_leads: 5000, confidence_score: 98 },
        is_hard_reset: true,
    }
}

#[tokio::test]
async fn test_entry_file_format() {
    let dir = tempfile::tempdir().unwrap();
    let config = CacheConfig {
        dir: dir.path().to_path_buf(),
        ..CacheConfig::default()
    };
    let cache = ResultCache::from_config(&config);
    cache.put_at("acme.com", &result("Acme"), 1_700_000_000_000).await.unwrap();

    let path = dir.path().join("spades_analysis_acme.com.json");
    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();

    assert_eq!(raw["timestamp"], 1_700_000_000_000i64);
    assert_eq!(raw["data"]["company_profile"]["name"], "Acme");
    assert_eq!(raw["data"]["icp_persona"]["preferred_channel"][0], "LinkedIn");
    assert_eq!(raw["data"]["market_data"]["total_leads"], 5000);
    assert_eq!(raw["data"]["is_hard_reset"], true);
}

#[tokio::test]
async fn test_seven_day_ttl_boundary() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ResultCache::from_config(&CacheConfig {
        dir: dir.path().to_path_buf(),
        ..CacheConfig::default()
    });
    assert_eq!(cache.ttl(), Duration::from_secs(7 * 24 * 60 * 60));

    let t = 1_700_000_000_000;
    cache.put_at("acme.com", &result("Acme"), t).await.unwrap();

    for offset in [0, DAY_MS, 6 * DAY_MS, 7 * DAY_MS] {
        assert!(cache.get_at("acme.com", t + offset).await.is_some(), "offset {}", offset);
    }
    assert!(cache.get_at("acme.com", t + 7 * DAY_MS + 1).await.is_none());
    assert!(cache.entries().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_legacy_entry_without_hard_reset_flag() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ResultCache::new(dir.path(), "spades_analysis_", Duration::from_secs(60));
    let mut value = serde_json::to_value(result("Acme")).unwrap();
    value.as_object_mut().unwrap().remove("is_hard_reset");
    let entry = serde_json::json!({ "timestamp": chrono::Utc::now().timestamp_millis(), "data": value });
    std::fs::write(cache.entry_path("acme.com"), entry.to_string()).unwrap();

    let cached = cache.get("acme.com").await.expect("entry readable");
    assert!(!cached.is_hard_reset);
}
