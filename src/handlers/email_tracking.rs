use axum::extract::Query;
use axum::http::header;
use axum::response::{IntoResponse, Redirect, Response};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;
use url::Url;

use crate::error::ApiError;
use crate::store::{names, now_timestamp, Store};

/// 1x1 transparent GIF served to email clients.
const TRACKING_PIXEL: [u8; 42] = [
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
    0x00, 0xff, 0xff, 0xff, 0x21, 0xf9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00,
    0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x01, 0x44, 0x00, 0x3b,
];

#[derive(Debug, Deserialize)]
pub struct OpenParams {
    pub message_id: Option<String>,
    pub email: Option<String>,
}

/// GET /api/email/track/open
///
/// Records the open and returns the pixel. Once the parameters check out
/// the pixel ALWAYS comes back, whatever the backing writes do: a broken
/// image in someone's inbox is worse than a lost tracking event.
pub async fn open(Query(params): Query<OpenParams>) -> Response {
    let (Some(message_id), Some(email)) = (params.message_id, params.email) else {
        return ApiError::missing_fields("message_id, email").into_response();
    };

    record_event(&message_id, &email, "open").await;
    pixel_response()
}

#[derive(Debug, Deserialize)]
pub struct ClickParams {
    pub message_id: Option<String>,
    pub email: Option<String>,
    pub url: Option<String>,
}

/// GET /api/email/track/click
///
/// Records the click and redirects. All three identifiers are required;
/// once they check out the redirect happens regardless of tracking outcome.
pub async fn click(Query(params): Query<ClickParams>) -> Response {
    let (Some(message_id), Some(email), Some(target)) = (
        params.message_id.filter(|m| !m.is_empty()),
        params.email.filter(|e| !e.is_empty()),
        params.url.filter(|u| !u.is_empty()),
    ) else {
        return ApiError::missing_fields("message_id, email, url").into_response();
    };
    if Url::parse(&target).is_err() {
        return ApiError::bad_request("Invalid redirect URL").into_response();
    }

    record_event(&message_id, &email, "click").await;

    Redirect::temporary(&target).into_response()
}

/// Best-effort engagement write: marks the email log and appends the event.
async fn record_event(message_id: &str, email: &str, event: &str) {
    let store = match Store::shared().await {
        Ok(store) => store,
        Err(e) => {
            warn!("Engagement tracking skipped, store unavailable: {}", e);
            return;
        }
    };

    let now = now_timestamp();
    let log_patch = match event {
        "open" => json!({ "opened": true, "opened_at": &now }),
        _ => json!({ "clicked": true, "clicked_at": &now }),
    };

    if let Err(e) = store
        .collection(names::EMAIL_LOGS)
        .merge(message_id, &log_patch)
        .await
    {
        warn!("Failed to mark email log {}: {}", message_id, e);
    }

    let engagement = json!({
        "message_id": message_id,
        "email": email,
        "event": event,
        "timestamp": now,
    });
    if let Err(e) = store
        .collection(names::EMAIL_ENGAGEMENT)
        .add(&engagement)
        .await
    {
        warn!("Failed to append engagement event: {}", e);
    }
}

fn pixel_response() -> Response {
    (
        [
            (header::CONTENT_TYPE, "image/gif"),
            (
                header::CACHE_CONTROL,
                "no-store, no-cache, must-revalidate, private",
            ),
            (header::PRAGMA, "no-cache"),
            (header::EXPIRES, "0"),
        ],
        TRACKING_PIXEL.to_vec(),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn pixel_is_a_gif() {
        assert_eq!(&TRACKING_PIXEL[..6], b"GIF89a");
        assert_eq!(TRACKING_PIXEL[TRACKING_PIXEL.len() - 1], 0x3b);
    }

    fn click_params(
        message_id: Option<&str>,
        email: Option<&str>,
        url: Option<&str>,
    ) -> Query<ClickParams> {
        Query(ClickParams {
            message_id: message_id.map(String::from),
            email: email.map(String::from),
            url: url.map(String::from),
        })
    }

    #[tokio::test]
    async fn click_requires_all_identifiers() {
        let cases = [
            click_params(None, Some("a@b.com"), Some("https://example.com")),
            click_params(Some("m1"), None, Some("https://example.com")),
            click_params(Some("m1"), Some("a@b.com"), None),
            click_params(Some(""), Some("a@b.com"), Some("https://example.com")),
        ];
        for params in cases {
            let res = click(params).await;
            assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn click_redirects_when_complete() {
        let res = click(click_params(
            Some("m1"),
            Some("a@b.com"),
            Some("https://example.com/page"),
        ))
        .await;
        assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(
            res.headers().get(header::LOCATION).unwrap(),
            "https://example.com/page"
        );
    }

    #[tokio::test]
    async fn click_rejects_unparseable_target() {
        let res = click(click_params(Some("m1"), Some("a@b.com"), Some("not a url"))).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
