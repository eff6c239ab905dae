//! HTTP transport to a platform bridge
//!
//! The platform's private API is not spoken directly. `HttpPlatform` talks to a
//! bridge service that exposes it as plain JSON over HTTP and forwards session
//! material in the `X-Session` header. This module owns the translation of
//! bridge responses into the typed error set:
//!
//! | response                              | error               |
//! |---------------------------------------|---------------------|
//! | 404                                   | `NotFound`          |
//! | 429                                   | `RateLimited`       |
//! | body mentions challenge / checkpoint  | `ChallengeRequired` |
//! | 401 or body mentions login_required   | `AuthRequired`      |
//! | 403 or body mentions private          | `PermissionDenied`  |
//! | anything else, or a transport failure | `Transient`         |

use std::time::Duration;

use platform::{
    AuthError, BoxFuture, ContentSnapshot, FollowerSnapshot, PlatformApi, ProfileRef,
    ProfileSnapshot, RemoteError, SessionToken,
};
use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

const SESSION_HEADER: &str = "x-session";

/// Login response from the bridge.
#[derive(Debug, Deserialize)]
struct LoginResponse {
    session: String,
}

/// `PlatformApi` over HTTP/JSON.
pub struct HttpPlatform {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPlatform {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        session: &SessionToken,
        path: String,
    ) -> Result<T, RemoteError> {
        debug!(path = %path, "platform request");
        let response = self
            .client
            .get(self.url(&path))
            .header(SESSION_HEADER, session.as_str())
            .send()
            .await
            .map_err(|e| RemoteError::Transient(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));
            return Err(classify_response(status, &body));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| RemoteError::Transient(format!("invalid response body: {e}")))
    }
}

/// Translate a non-success bridge response into a `RemoteError`.
pub fn classify_response(status: StatusCode, body: &str) -> RemoteError {
    let lowered = body.to_lowercase();
    let detail = format!("{status}: {body}");

    if status == StatusCode::NOT_FOUND {
        RemoteError::NotFound(detail)
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        RemoteError::RateLimited(detail)
    } else if lowered.contains("challenge") || lowered.contains("checkpoint") {
        RemoteError::ChallengeRequired(detail)
    } else if status == StatusCode::UNAUTHORIZED || lowered.contains("login_required") {
        RemoteError::AuthRequired(detail)
    } else if status == StatusCode::FORBIDDEN || lowered.contains("private") {
        RemoteError::PermissionDenied(detail)
    } else {
        RemoteError::Transient(detail)
    }
}

/// Translate a failed login or session check into an `AuthError`.
pub fn classify_auth_response(status: StatusCode, body: &str) -> AuthError {
    match classify_response(status, body) {
        RemoteError::RateLimited(msg) => AuthError::RateLimited(msg),
        RemoteError::ChallengeRequired(msg) => AuthError::ChallengeRequired(msg),
        RemoteError::AuthRequired(msg) | RemoteError::PermissionDenied(msg) => {
            AuthError::BadCredentials(msg)
        }
        RemoteError::NotFound(msg) | RemoteError::Transient(msg) => AuthError::Transient(msg),
    }
}

impl PlatformApi for HttpPlatform {
    fn id(&self) -> &str {
        "http"
    }

    fn login<'a>(
        &'a self,
        handle: &'a str,
        password: &'a str,
    ) -> BoxFuture<'a, Result<SessionToken, AuthError>> {
        Box::pin(async move {
            let response = self
                .client
                .post(self.url("/v1/session/login"))
                .json(&serde_json::json!({ "username": handle, "password": password }))
                .send()
                .await
                .map_err(|e| AuthError::Transient(format!("login request failed: {e}")))?;

            let status = response.status();
            if !status.is_success() {
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| String::from("<no body>"));
                return Err(classify_auth_response(status, &body));
            }

            let login = response
                .json::<LoginResponse>()
                .await
                .map_err(|e| AuthError::Transient(format!("invalid login response: {e}")))?;
            Ok(SessionToken::new(login.session))
        })
    }

    fn verify_session<'a>(&'a self, session: &'a SessionToken) -> BoxFuture<'a, Result<(), AuthError>> {
        Box::pin(async move {
            let response = self
                .client
                .get(self.url("/v1/session/verify"))
                .header(SESSION_HEADER, session.as_str())
                .send()
                .await
                .map_err(|e| AuthError::Transient(format!("verify request failed: {e}")))?;

            let status = response.status();
            if status.is_success() {
                return Ok(());
            }
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));
            match classify_auth_response(status, &body) {
                AuthError::BadCredentials(msg) => Err(AuthError::SessionExpired(msg)),
                other => Err(other),
            }
        })
    }

    fn profile<'a>(
        &'a self,
        session: &'a SessionToken,
        target: &'a ProfileRef,
    ) -> BoxFuture<'a, Result<ProfileSnapshot, RemoteError>> {
        Box::pin(async move {
            let path = match target {
                ProfileRef::Id(id) => format!("/v1/users/{}", urlencoding::encode(id)),
                ProfileRef::Handle(handle) => {
                    format!("/v1/users/by-handle/{}", urlencoding::encode(handle))
                }
            };
            self.get_json(session, path).await
        })
    }

    fn content<'a>(
        &'a self,
        session: &'a SessionToken,
        content_id: &'a str,
    ) -> BoxFuture<'a, Result<ContentSnapshot, RemoteError>> {
        Box::pin(async move {
            self.get_json(session, format!("/v1/media/{}", urlencoding::encode(content_id)))
                .await
        })
    }

    fn top_content_for_tag<'a>(
        &'a self,
        session: &'a SessionToken,
        tag: &'a str,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<ContentSnapshot>, RemoteError>> {
        Box::pin(async move {
            let path = format!("/v1/tags/{}/top?limit={limit}", urlencoding::encode(tag));
            self.get_json(session, path).await
        })
    }

    fn followers<'a>(
        &'a self,
        session: &'a SessionToken,
        user_id: &'a str,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<FollowerSnapshot>, RemoteError>> {
        Box::pin(async move {
            let path = format!("/v1/users/{}/followers?limit={limit}", urlencoding::encode(user_id));
            self.get_json(session, path).await
        })
    }

    fn recent_content<'a>(
        &'a self,
        session: &'a SessionToken,
        user_id: &'a str,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<ContentSnapshot>, RemoteError>> {
        Box::pin(async move {
            let path = format!("/v1/users/{}/media?limit={limit}", urlencoding::encode(user_id));
            self.get_json(session, path).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::extract::Path;
    use axum::http::HeaderMap;
    use axum::routing::{get, post};

    #[test]
    fn classify_by_status() {
        assert!(matches!(
            classify_response(StatusCode::NOT_FOUND, ""),
            RemoteError::NotFound(_)
        ));
        assert!(matches!(
            classify_response(StatusCode::TOO_MANY_REQUESTS, "please wait"),
            RemoteError::RateLimited(_)
        ));
        assert!(matches!(
            classify_response(StatusCode::UNAUTHORIZED, ""),
            RemoteError::AuthRequired(_)
        ));
        assert!(matches!(
            classify_response(StatusCode::FORBIDDEN, ""),
            RemoteError::PermissionDenied(_)
        ));
        assert!(matches!(
            classify_response(StatusCode::BAD_GATEWAY, "upstream reset"),
            RemoteError::Transient(_)
        ));
    }

    #[test]
    fn classify_by_body() {
        assert!(matches!(
            classify_response(StatusCode::BAD_REQUEST, r#"{"message":"challenge_required"}"#),
            RemoteError::ChallengeRequired(_)
        ));
        assert!(matches!(
            classify_response(StatusCode::FORBIDDEN, "checkpoint_required"),
            RemoteError::ChallengeRequired(_)
        ));
        assert!(matches!(
            classify_response(StatusCode::BAD_REQUEST, "login_required"),
            RemoteError::AuthRequired(_)
        ));
        assert!(matches!(
            classify_response(StatusCode::BAD_REQUEST, "Not authorized to view user: account is private"),
            RemoteError::PermissionDenied(_)
        ));
    }

    #[test]
    fn classify_auth() {
        assert!(matches!(
            classify_auth_response(StatusCode::BAD_REQUEST, "bad_password"),
            AuthError::Transient(_)
        ));
        assert!(matches!(
            classify_auth_response(StatusCode::UNAUTHORIZED, "bad_password"),
            AuthError::BadCredentials(_)
        ));
        assert!(matches!(
            classify_auth_response(StatusCode::BAD_REQUEST, "challenge_required"),
            AuthError::ChallengeRequired(_)
        ));
        assert!(matches!(
            classify_auth_response(StatusCode::TOO_MANY_REQUESTS, ""),
            AuthError::RateLimited(_)
        ));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let platform = HttpPlatform::with_client(reqwest::Client::new(), "http://bridge:8080/");
        assert_eq!(platform.url("/v1/media/1"), "http://bridge:8080/v1/media/1");
    }

    async fn spawn_bridge() -> String {
        let app = Router::new()
            .route(
                "/v1/session/login",
                post(|| async { axum::Json(serde_json::json!({ "session": "bridge-session" })) }),
            )
            .route(
                "/v1/users/{id}",
                get(|Path(id): Path<String>, headers: HeaderMap| async move {
                    if headers.get(SESSION_HEADER).and_then(|v| v.to_str().ok()) != Some("bridge-session") {
                        return (StatusCode::UNAUTHORIZED, "login_required".to_string());
                    }
                    if id != "42" {
                        return (StatusCode::NOT_FOUND, "no such user".to_string());
                    }
                    (
                        StatusCode::OK,
                        serde_json::json!({
                            "external_id": "42",
                            "handle": "travel.kim",
                            "follower_count": 15300,
                            "following_count": 210,
                            "media_count": 388
                        })
                        .to_string(),
                    )
                }),
            )
            .route(
                "/v1/tags/{tag}/top",
                get(|Path(tag): Path<String>| async move {
                    if tag != "여행/2024" {
                        return (StatusCode::NOT_FOUND, "no such tag".to_string());
                    }
                    (StatusCode::OK, "[]".to_string())
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn login_and_profile_against_bridge() {
        let base = spawn_bridge().await;
        let platform = HttpPlatform::new(base, Duration::from_secs(5)).unwrap();

        let session = platform.login("crawler_01", "pw").await.unwrap();
        assert_eq!(session.as_str(), "bridge-session");

        let profile = platform
            .profile(&session, &ProfileRef::Id("42".into()))
            .await
            .unwrap();
        assert_eq!(profile.handle, "travel.kim");
        assert_eq!(profile.follower_count, 15300);

        let missing = platform.profile(&session, &ProfileRef::Id("7".into())).await;
        assert!(matches!(missing, Err(RemoteError::NotFound(_))));

        let forged = SessionToken::new("forged");
        let denied = platform.profile(&forged, &ProfileRef::Id("42".into())).await;
        assert!(matches!(denied, Err(RemoteError::AuthRequired(_))));
    }

    #[tokio::test]
    async fn tag_is_sent_as_one_encoded_segment() {
        let base = spawn_bridge().await;
        let platform = HttpPlatform::new(base, Duration::from_secs(5)).unwrap();

        let feed = platform
            .top_content_for_tag(&SessionToken::new("s"), "여행/2024", 10)
            .await
            .unwrap();
        assert!(feed.is_empty());
    }

    #[tokio::test]
    async fn unreachable_bridge_is_transient() {
        // Port 9 (discard) on localhost is almost never listening
        let platform = HttpPlatform::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let result = platform.content(&SessionToken::new("s"), "1").await;
        assert!(matches!(result, Err(RemoteError::Transient(_))));
    }
}
