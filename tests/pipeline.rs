//! End-to-end behaviour of the request pipeline over real sockets.

use std::time::Duration;

use reqwest::{header, StatusCode};
use serde_json::Value;
use service_spine::http::{endpoints, Handler, Request};

mod common;

use common::{ADA_TOKEN, BOB_TOKEN, CY_TOKEN};

#[tokio::test]
async fn test_healthcheck_is_public() {
    let server = common::spawn(common::test_config()).await;

    let res = server.get("/v1/healthcheck", None).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()[header::VARY], "Authorization");
    assert_eq!(res.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert!(res.headers().contains_key("x-request-id"));

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "available");
    assert_eq!(body["system_info"]["environment"], "development");

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_authentication_and_activation_ordering() {
    let server = common::spawn(common::test_config()).await;

    // anonymous gets the 401 wording, never the 403 one
    let res = server.get("/v1/me", None).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(
        body["error"],
        "you must be authenticated to access this resource"
    );

    let res = server.get("/v1/me", Some(CY_TOKEN)).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: Value = res.json().await.unwrap();
    assert_eq!(
        body["error"],
        "your user account must be activated to access this resource"
    );

    let res = server.get("/v1/me", Some(ADA_TOKEN)).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["user"]["name"], "ada");
    assert_eq!(body["user"]["activated"], true);

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_bad_credentials_are_indistinguishable() {
    let server = common::spawn(common::test_config()).await;

    let mut bodies = Vec::new();
    for auth in [
        "Token AAAAAAAAAAAAAAAAAAAAAAAAAA".to_string(),
        format!("Bearer {ADA_TOKEN} trailing"),
        "Bearer too-short".to_string(),
        // well formed, never issued
        "Bearer ZZZZZZZZZZZZZZZZZZZZZZZZZZ".to_string(),
    ] {
        let res = server
            .client
            .get(server.url("/v1/healthcheck"))
            .header(header::AUTHORIZATION, &auth)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "{auth}");
        assert_eq!(res.headers()[header::WWW_AUTHENTICATE], "Bearer");
        assert_eq!(res.headers()[header::VARY], "Authorization");
        bodies.push(res.text().await.unwrap());
    }
    assert!(bodies.windows(2).all(|w| w[0] == w[1]));

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_permission_gate() {
    let server = common::spawn(common::test_config()).await;

    let res = server.get("/v1/permissions", Some(BOB_TOKEN)).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    // holds the permission but is not activated
    let res = server.get("/v1/permissions", Some(CY_TOKEN)).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = server.get("/v1/permissions", Some(ADA_TOKEN)).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["permissions"], serde_json::json!([endpoints::PERMISSIONS_READ]));

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_route_misses() {
    let server = common::spawn(common::test_config()).await;

    let res = server.get("/v1/nothing-here", None).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = server
        .client
        .delete(server.url("/v1/healthcheck"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(res.headers()[header::ALLOW], "GET");

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_rate_limit_admits_burst_then_refills() {
    let mut config = common::test_config();
    config.limiter.enabled = true;
    config.limiter.requests_per_second = 2.0;
    config.limiter.burst = 4;
    let server = common::spawn(config).await;

    let mut statuses = Vec::new();
    for _ in 0..5 {
        statuses.push(server.get("/v1/healthcheck", None).await.status());
    }
    assert_eq!(&statuses[..4], &[StatusCode::OK; 4]);
    assert_eq!(statuses[4], StatusCode::TOO_MANY_REQUESTS);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(
        server.get("/v1/healthcheck", None).await.status(),
        StatusCode::OK
    );

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_panic_is_contained() {
    let server = common::spawn_with(common::test_config(), |state| {
        endpoints::routes(state).get(
            "/explode",
            Handler::new(|req: Request| async move {
                if req.uri().path() == "/explode" {
                    panic!("handler exploded");
                }
                StatusCode::OK
            }),
        )
    })
    .await;

    let res = server.get("/explode", None).await;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.headers()[header::CONNECTION], "close");
    assert_eq!(res.headers()[header::VARY], "Authorization");
    assert_eq!(res.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    let body: Value = res.json().await.unwrap();
    assert_eq!(
        body["error"],
        "the server encountered a problem and could not process your request"
    );

    // still serving
    let res = server.get("/v1/healthcheck", None).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(server.state.metrics.responses_with_status(500), 1);

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_metrics_count_every_response() {
    let server = common::spawn(common::test_config()).await;

    let requests = [
        ("/v1/healthcheck", None),
        ("/v1/healthcheck", Some(ADA_TOKEN)),
        ("/v1/me", None),
        ("/v1/me", Some(CY_TOKEN)),
        ("/v1/permissions", Some(ADA_TOKEN)),
        ("/missing", None),
    ];
    for (path, token) in requests {
        server.get(path, token).await;
    }

    let vars: Value = server.get("/debug/vars", None).await.json().await.unwrap();
    let n = requests.len() as u64;
    // the snapshot is taken while its own request is still in flight
    assert_eq!(vars["total_requests_received"], n + 1);
    assert_eq!(vars["total_responses_sent"], n);

    let by_status = vars["total_responses_sent_by_status"].as_object().unwrap();
    let sum: u64 = by_status.values().map(|v| v.as_u64().unwrap()).sum();
    assert_eq!(sum, n);
    assert_eq!(by_status["200"], 3);
    assert_eq!(by_status["401"], 1);
    assert_eq!(by_status["403"], 1);
    assert_eq!(by_status["404"], 1);

    server.shutdown().await.unwrap();
}
