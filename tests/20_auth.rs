mod common;

use anyhow::Result;
use reqwest::StatusCode;

#[tokio::test]
async fn admin_routes_reject_missing_token() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    for path in [
        "/api/admin/auth",
        "/api/admin/affiliates",
        "/api/admin/promo-codes",
        "/api/admin/users/u1",
        "/api/admin/audit-logs",
        "/api/admin/analytics/dashboard",
    ] {
        let res = client
            .get(format!("{}{}", server.base_url, path))
            .send()
            .await?;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "path: {}", path);

        let body = res.json::<serde_json::Value>().await?;
        assert_eq!(body["error"], "Unauthorized", "path: {}", path);
    }
    Ok(())
}

#[tokio::test]
async fn admin_routes_reject_garbage_token() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/api/admin/auth", server.base_url))
        .header("authorization", "Bearer not-a-real-token")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn non_bearer_scheme_is_rejected() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/api/users", server.base_url))
        .header("authorization", "Basic Zm9vOmJhcg==")
        .json(&serde_json::json!({ "user_id": "u1" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}
