use serde_json::Value;
use tokensmith_server::config::SeedUser;
use tokensmith_server::{AppConfig, build_app};
use tokio::task::JoinHandle;

fn test_config() -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.tokens.secret_key = Some("integration-secret".to_string());
    cfg.users.push(SeedUser {
        username: "alice".to_string(),
        password: "wonderland".to_string(),
    });
    cfg
}

async fn start_server(
    cfg: AppConfig,
) -> (String, tokio::sync::oneshot::Sender<()>, JoinHandle<()>) {
    let app = build_app(&cfg).expect("build app");

    // Bind to an ephemeral port
    let listener = tokio::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let server = tokio::spawn(async move {
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = rx.await;
            })
            .await;
    });

    (format!("http://{addr}"), tx, server)
}

async fn login(client: &reqwest::Client, base: &str) -> Value {
    let resp = client
        .post(format!("{base}/auth"))
        .form(&[("username", "alice"), ("password", "wonderland")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    resp.json().await.unwrap()
}

#[tokio::test]
async fn server_endpoints_work() {
    let (base, shutdown_tx, handle) = start_server(test_config()).await;
    let client = reqwest::Client::new();

    // GET /healthz
    let resp = client.get(format!("{base}/healthz")).send().await.unwrap();
    assert!(resp.status().is_success());
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");

    // GET / anonymously
    let resp = client.get(format!("{base}/")).send().await.unwrap();
    assert_eq!(resp.text().await.unwrap(), "Hi, anonymous!");

    // GET /protected without a token
    let resp = client.get(format!("{base}/protected")).send().await.unwrap();
    assert_eq!(resp.status(), 403);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "authentication_failed");

    // POST /auth with a wrong password
    let resp = client
        .post(format!("{base}/auth"))
        .form(&[("username", "alice"), ("password", "looking-glass")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    // POST /auth without a password
    let resp = client
        .post(format!("{base}/auth"))
        .form(&[("username", "alice")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "malformed_credentials");

    // POST /auth
    let body = login(&client, &base).await;
    let token = body["token"].as_str().unwrap().to_string();
    let refresh_token = body["refresh_token"].as_str().unwrap().to_string();
    assert!(body["expires_at"].is_string());

    // GET / and /protected with the token
    let resp = client
        .get(format!("{base}/"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.text().await.unwrap(), "Hi, alice!");

    let resp = client
        .get(format!("{base}/protected"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["username"], "alice");

    // POST /auth/refresh
    let resp = client
        .post(format!("{base}/auth/refresh"))
        .form(&[("token", token.as_str()), ("refresh_token", refresh_token.as_str())])
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    let body: Value = resp.json().await.unwrap();
    let refreshed = body["token"].as_str().unwrap().to_string();
    assert_ne!(refreshed, token);
    assert!(body.get("refresh_token").is_none());

    let resp = client
        .get(format!("{base}/protected"))
        .bearer_auth(&refreshed)
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());

    // POST /auth/refresh with a wrong refresh token
    let resp = client
        .post(format!("{base}/auth/refresh"))
        .form(&[("token", token.as_str()), ("refresh_token", "guess")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "refresh_denied");

    // POST /auth/refresh with only a token
    let resp = client
        .post(format!("{base}/auth/refresh"))
        .form(&[("token", token.as_str())])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    // POST /auth/revoke, then every token and the refresh token are dead
    let resp = client
        .post(format!("{base}/auth/revoke"))
        .bearer_auth(&refreshed)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    for t in [&token, &refreshed] {
        let resp = client
            .get(format!("{base}/protected"))
            .bearer_auth(t)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 403);
    }

    let resp = client
        .post(format!("{base}/auth/refresh"))
        .form(&[("token", token.as_str()), ("refresh_token", refresh_token.as_str())])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    // Logging in again works
    let body = login(&client, &base).await;
    let resp = client
        .get(format!("{base}/protected"))
        .bearer_auth(body["token"].as_str().unwrap())
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn prefixed_routes_without_refresh() {
    let mut cfg = test_config();
    cfg.tokens.url_prefix = Some("/api".to_string());
    cfg.tokens.enable_refresh = false;
    cfg.tokens.expiry = None;
    let (base, shutdown_tx, handle) = start_server(cfg).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/api/auth"))
        .form(&[("username", "alice"), ("password", "wonderland")])
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    let body: Value = resp.json().await.unwrap();
    assert!(body["token"].is_string());
    assert!(body.get("refresh_token").is_none());
    assert!(body.get("expires_at").is_none());

    let resp = client
        .post(format!("{base}/api/auth/refresh"))
        .form(&[("token", "x"), ("refresh_token", "y")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let resp = client
        .post(format!("{base}/api/auth/revoke"))
        .bearer_auth(body["token"].as_str().unwrap())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}
