//! Avatar candidate probing against a mock image host

mod common;

use common::test_config;
use spades_icp::avatar::{AvatarDisplay, AvatarResolver, AvatarState};
use spades_icp::AnalysisPipeline;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];

async fn mount_image(server: &MockServer, image_path: &str) {
    Mock::given(method("GET"))
        .and(path(image_path))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(PNG_BYTES)
                .insert_header("content-type", "image/png"),
        )
        .mount(server)
        .await;
}

async fn mount_html(server: &MockServer, page_path: &str) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html><body>Sign in</body></html>")
                .insert_header("content-type", "text/html; charset=utf-8"),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_third_candidate_shown_after_missing_and_non_image() {
    let server = MockServer::start().await;
    mount_html(&server, "/share/p2").await;
    mount_image(&server, "/cdn/p2.png").await;

    let candidates = vec![
        format!("{}/missing/p2.png", server.uri()),
        format!("{}/share/p2", server.uri()),
        format!("{}/cdn/p2.png", server.uri()),
    ];
    let mut resolver = AvatarResolver::from_candidates("Jonas Berg", candidates.clone());

    let state = resolver.probe(&reqwest::Client::new()).await;

    assert_eq!(state, AvatarState::Shown(2));
    assert_eq!(
        resolver.display(),
        AvatarDisplay::Image { url: candidates[2].clone(), attempt: 2 }
    );
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_all_candidates_failing_end_in_initials() {
    let server = MockServer::start().await;
    mount_html(&server, "/share/p2").await;

    let candidates = vec![
        format!("{}/missing/p2.png", server.uri()),
        format!("{}/share/p2", server.uri()),
    ];
    let mut resolver = AvatarResolver::from_candidates("Jonas Berg", candidates);

    assert_eq!(resolver.probe(&reqwest::Client::new()).await, AvatarState::Placeholder);
    assert_eq!(
        resolver.display(),
        AvatarDisplay::Placeholder { initials: "JB".to_string() }
    );
}

#[tokio::test]
async fn test_pipeline_resolves_avatar_of_result() {
    let server = MockServer::start().await;
    let cache_dir = tempfile::tempdir().unwrap();
    let config = test_config(&server, cache_dir.path());
    let pipeline = AnalysisPipeline::with_client(reqwest::Client::new(), &config, None);

    mount_image(&server, "/avatars/dana.png").await;
    // Nothing else is mounted, so the result carries the built-in persona
    let mut result = pipeline
        .start("acme.com", false)
        .await
        .unwrap()
        .into_result()
        .unwrap();
    assert_eq!(result.icp_persona.name, "Alex");
    result.icp_persona.avatar_id = format!("\"{}/avatars/dana.png\"", server.uri());

    let avatar = pipeline.resolve_avatar(&result).await;

    let bust = result.company_profile.domain.len();
    assert_eq!(
        avatar,
        AvatarDisplay::Image {
            url: format!("{}/avatars/dana.png?v={}", server.uri(), bust),
            attempt: 0
        }
    );

    result.icp_persona.avatar_id = String::new();
    assert_eq!(
        pipeline.resolve_avatar(&result).await,
        AvatarDisplay::Placeholder { initials: "A".to_string() }
    );
}
