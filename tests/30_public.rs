mod common;

use anyhow::Result;
use reqwest::redirect::Policy;
use reqwest::StatusCode;

#[tokio::test]
async fn tracking_pixel_requires_identifiers() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/api/email/track/open", server.base_url))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn tracking_pixel_always_serves_the_gif() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    // Even with no store behind it the pixel must come back
    let res = client
        .get(format!(
            "{}/api/email/track/open?message_id=m1&email=a%40b.c",
            server.base_url
        ))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers().get("content-type").and_then(|v| v.to_str().ok()),
        Some("image/gif")
    );

    let body = res.bytes().await?;
    assert_eq!(&body[..6], b"GIF89a");
    Ok(())
}

#[tokio::test]
async fn click_tracking_redirects_to_target() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::builder()
        .redirect(Policy::none())
        .build()?;

    let res = client
        .get(format!(
            "{}/api/email/track/click?message_id=m1&email=a%40b.c&url=https%3A%2F%2Fwww.pathgen.dev%2Fchat.html",
            server.base_url
        ))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        res.headers().get("location").and_then(|v| v.to_str().ok()),
        Some("https://www.pathgen.dev/chat.html")
    );
    Ok(())
}

#[tokio::test]
async fn click_tracking_requires_all_identifiers() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    // Any missing identifier is a 400, target included
    for query in [
        "",
        "url=https%3A%2F%2Fwww.pathgen.dev",
        "message_id=m1&url=https%3A%2F%2Fwww.pathgen.dev",
        "message_id=m1&email=a%40b.c",
    ] {
        let res = client
            .get(format!(
                "{}/api/email/track/click?{}",
                server.base_url, query
            ))
            .send()
            .await?;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "query: {}", query);
    }
    Ok(())
}
