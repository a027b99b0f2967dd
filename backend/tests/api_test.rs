use std::sync::Arc;

use axum::body::Body;
use axum::Router;
use carpool_backend::test_util::{create_test_state, seed_user, test_config};
use carpool_backend::{app, AppState};
use carpool_common::Role;
use http::{Method, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header("Content-Type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

/// A driver, two riders and a router over one in-memory database.
struct World {
    app: Router,
    driver: String,
    rider_a: String,
    rider_b: String,
}

impl World {
    fn new() -> Self {
        let state = create_test_state();
        let (_, driver) = seed_user(&state, "driver@sp.senac.br", Role::User);
        let (_, rider_a) = seed_user(&state, "a@sp.senac.br", Role::User);
        let (_, rider_b) = seed_user(&state, "b@sp.senac.br", Role::User);
        Self {
            app: app(state),
            driver,
            rider_a,
            rider_b,
        }
    }

    async fn create_trip(&self, from: &str, to: &str, date: &str, spots: Value) -> i64 {
        let (status, body) = call(
            &self.app,
            Method::POST,
            "/create-trip",
            Some(&self.driver),
            Some(json!({
                "from": from,
                "to": to,
                "departureDate": date,
                "departureTime": "08:00",
                "spots": spots,
                "message": "Saio pontualmente",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["trip"]["id"].as_i64().unwrap()
    }

    async fn request_ride(&self, token: &str, share_id: i64) -> (StatusCode, Value) {
        call(
            &self.app,
            Method::POST,
            "/request-ride",
            Some(token),
            Some(json!({ "shareId": share_id, "message": "Posso ir?" })),
        )
        .await
    }

    async fn set_status(&self, token: &str, request_id: i64, status: &str) -> (StatusCode, Value) {
        call(
            &self.app,
            Method::PATCH,
            &format!("/requests/{}/status", request_id),
            Some(token),
            Some(json!({ "status": status })),
        )
        .await
    }

    async fn spots(&self, share_id: i64) -> i64 {
        let (status, trips) = call(&self.app, Method::GET, "/trips/driving", Some(&self.driver), None).await;
        assert_eq!(status, StatusCode::OK);
        trips
            .as_array()
            .unwrap()
            .iter()
            .find(|t| t["id"].as_i64() == Some(share_id))
            .and_then(|t| t["spots"].as_i64())
            .unwrap()
    }
}

fn request_id(body: &Value) -> i64 {
    body["request"]["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_register_approve_login_flow() {
    let state = create_test_state();
    let (_, admin) = seed_user(&state, "root@sp.senac.br", Role::Admin);
    let app = app(state);

    let registration = json!({
        "firstName": "Ana",
        "lastName": "Lima",
        "email": "Ana@Example.com",
        "password": "password123",
        "gender": "feminino",
        "senacId": "ana.lima@sp.senac.br",
    });

    let (status, body) = call(&app, Method::POST, "/register", None, Some(registration.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "User registered successfully");
    assert_eq!(body["user"]["email"], "ana@example.com");
    assert_eq!(body["user"]["verificationStatus"], "PENDING");
    assert!(body["user"].get("passwordHash").is_none());
    let user_id = body["user"]["id"].as_i64().unwrap();

    let (status, body) = call(&app, Method::POST, "/register", None, Some(registration)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "User already exists");

    let credentials = json!({ "email": "ana@example.com", "password": "password123" });
    let (status, _) = call(&app, Method::POST, "/login", None, Some(credentials.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, pending) = call(&app, Method::GET, "/admin/users?status=PENDING", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pending.as_array().unwrap().len(), 1);

    let (status, body) = call(
        &app,
        Method::PATCH,
        &format!("/admin/users/{}/status", user_id),
        Some(&admin),
        Some(json!({ "status": "APROVADO" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["verificationStatus"], "APPROVED");

    let (status, body) = call(&app, Method::POST, "/login", None, Some(credentials)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Login successful");
    assert_eq!(body["role"], "USER");

    let token = body["token"].as_str().unwrap();
    let (status, body) = call(&app, Method::GET, "/protected/share", Some(token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "You can access this route!");
}

#[tokio::test]
async fn test_register_rejects_foreign_institution_id() {
    let app = app(create_test_state());
    let (status, body) = call(
        &app,
        Method::POST,
        "/register",
        None,
        Some(json!({
            "firstName": "Ana",
            "lastName": "Lima",
            "email": "ana@example.com",
            "password": "password123",
            "senacId": "ana@gmail.com",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("institutional"));
}

#[tokio::test]
async fn test_login_with_wrong_password_is_400() {
    let app = app(create_test_state());
    let (status, body) = call(
        &app,
        Method::POST,
        "/login",
        None,
        Some(json!({ "email": "nobody@sp.senac.br", "password": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid email or password");
}

#[tokio::test]
async fn test_admin_status_update_errors() {
    let state = create_test_state();
    let (_, admin) = seed_user(&state, "root@sp.senac.br", Role::Admin);
    let (user, _) = seed_user(&state, "ana@sp.senac.br", Role::User);
    let app = app(state);

    let (status, _) = call(
        &app,
        Method::PATCH,
        "/admin/users/999/status",
        Some(&admin),
        Some(json!({ "status": "APPROVED" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(
        &app,
        Method::PATCH,
        &format!("/admin/users/{}/status", user.id),
        Some(&admin),
        Some(json!({ "status": "MAYBE" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_seat_accounting_with_three_spots() {
    let world = World::new();
    let share = world.create_trip("Centro", "Universidade", "2030-05-10", json!(3)).await;

    let (status, body) = world.request_ride(&world.rider_a, share).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["request"]["status"], "PENDING");
    let a = request_id(&body);
    let b = request_id(&world.request_ride(&world.rider_b, share).await.1);

    let (status, body) = world.set_status(&world.driver, a, "APPROVED").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Request status updated successfully");
    assert_eq!(body["request"]["status"], "APPROVED");
    assert_eq!(world.spots(share).await, 2);

    world.set_status(&world.driver, b, "APPROVED").await;
    assert_eq!(world.spots(share).await, 1);

    let (status, body) = world.set_status(&world.driver, a, "DECLINED").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["request"]["status"], "DECLINED");
    assert_eq!(world.spots(share).await, 2);

    // Repeating a status changes nothing.
    world.set_status(&world.driver, b, "APPROVED").await;
    world.set_status(&world.driver, a, "DECLINED").await;
    assert_eq!(world.spots(share).await, 2);
}

#[tokio::test]
async fn test_full_trip_refuses_approval_and_new_requests() {
    let world = World::new();
    let share = world.create_trip("Centro", "Universidade", "2030-05-10", json!("1")).await;

    let a = request_id(&world.request_ride(&world.rider_a, share).await.1);
    let b = request_id(&world.request_ride(&world.rider_b, share).await.1);

    let (status, _) = world.set_status(&world.driver, a, "APPROVED").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(world.spots(share).await, 0);

    let (status, body) = world.set_status(&world.driver, b, "APPROVED").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "No spots available for this ride");
    assert_eq!(world.spots(share).await, 0);

    let (status, body) = world.request_ride(&world.rider_b, share).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "No spots available for this ride");
}

#[tokio::test]
async fn test_request_ride_for_missing_trip_is_400() {
    let world = World::new();
    let (status, body) = world.request_ride(&world.rider_a, 4242).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "No spots available for this ride");
}

#[tokio::test]
async fn test_request_status_route_checks() {
    let world = World::new();
    let share = world.create_trip("Centro", "Universidade", "2030-05-10", json!(2)).await;
    let a = request_id(&world.request_ride(&world.rider_a, share).await.1);

    let (status, body) = world.set_status(&world.driver, a, "MAYBE").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid status");

    let (status, body) = world.set_status(&world.driver, 999, "APPROVED").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Request not found");

    // Neither driver nor rider of this request.
    let (status, _) = world.set_status(&world.rider_b, a, "DECLINED").await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = world.set_status(&world.rider_a, a, "APPROVED").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(world.spots(share).await, 2);

    let (status, body) = world.set_status(&world.rider_a, a, "DECLINED").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["request"]["status"], "DECLINED");
}

#[tokio::test]
async fn test_create_trip_validation() {
    let world = World::new();
    for spots in [json!(0), json!(-1), json!("lots")] {
        let (status, _) = call(
            &world.app,
            Method::POST,
            "/create-trip",
            Some(&world.driver),
            Some(json!({
                "from": "Centro",
                "to": "Universidade",
                "departureDate": "2030-05-10",
                "departureTime": "08:00",
                "spots": spots,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    let (status, _) = call(
        &world.app,
        Method::POST,
        "/create-trip",
        Some(&world.driver),
        Some(json!({ "from": "Centro" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_out_of_range_dates_leave_listings_intact() {
    let world = World::new();
    let share = world.create_trip("Centro", "Universidade", "2030-05-10", json!(2)).await;

    for date in ["+12026-05-10", "-0001-05-10"] {
        let (status, _) = call(
            &world.app,
            Method::POST,
            "/create-trip",
            Some(&world.driver),
            Some(json!({
                "from": "Centro",
                "to": "Universidade",
                "departureDate": date,
                "departureTime": "08:00",
                "spots": 2,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    for uri in ["/search-rides?date=%2B262142-12-31", "/search-rides?date=-0001-05-10"] {
        let (status, _) = call(&world.app, Method::GET, uri, Some(&world.rider_a), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    let (status, results) = call(&world.app, Method::GET, "/search-rides", Some(&world.rider_a), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(results.as_array().unwrap().len(), 1);
    assert_eq!(results[0]["id"].as_i64(), Some(share));

    let (status, driving) = call(&world.app, Method::GET, "/trips/driving", Some(&world.driver), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(driving.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_search_rides() {
    let world = World::new();
    let hit = world.create_trip("Centro", "Universidade", "2030-05-10", json!(2)).await;
    world.create_trip("Norte", "Universidade", "2030-05-10", json!(2)).await;
    world.create_trip("Centro", "Universidade", "2030-05-12", json!(2)).await;

    let (status, results) = call(
        &world.app,
        Method::GET,
        "/search-rides?from=cent&to=UNIV&date=2030-05-10",
        Some(&world.rider_a),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let results = results.as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["id"].as_i64(), Some(hit));
    assert_eq!(results[0]["driver"]["firstName"], "Test");

    let (status, _) = call(
        &world.app,
        Method::GET,
        "/search-rides?date=10-05-2030",
        Some(&world.rider_a),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, none) = call(
        &world.app,
        Method::GET,
        "/search-rides?from=Nowhere",
        Some(&world.rider_a),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(none, json!([]));
}

#[tokio::test]
async fn test_trip_listings() {
    let world = World::new();
    let share = world.create_trip("Centro", "Universidade", "2030-05-10", json!(2)).await;
    let a = request_id(&world.request_ride(&world.rider_a, share).await.1);

    let (_, driving) = call(&world.app, Method::GET, "/trips/driving", Some(&world.driver), None).await;
    assert_eq!(driving[0]["requests"][0]["id"].as_i64(), Some(a));
    assert_eq!(driving[0]["requests"][0]["user"]["lastName"], "User");

    let (_, incoming) =
        call(&world.app, Method::GET, "/trips/ride-requests", Some(&world.driver), None).await;
    assert_eq!(incoming.as_array().unwrap().len(), 1);
    assert_eq!(incoming[0]["share"]["id"].as_i64(), Some(share));

    let (_, riding) = call(&world.app, Method::GET, "/trips/riding", Some(&world.rider_a), None).await;
    assert_eq!(riding[0]["share"]["origin"], "Centro");
    assert_eq!(riding[0]["status"], "PENDING");

    let (_, empty) = call(&world.app, Method::GET, "/trips/riding", Some(&world.rider_b), None).await;
    assert_eq!(empty, json!([]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_approvals_across_connections_take_one_seat() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config();
    config.database.url = format!("sqlite:{}", dir.path().join("carpool.db").display());

    let first = Arc::new(AppState::new(config.clone()).unwrap());
    let second = Arc::new(AppState::new(config).unwrap());

    let (driver, driver_token) = seed_user(&first, "driver@sp.senac.br", Role::User);
    let share = first
        .store
        .insert_share(&carpool_backend::test_util::new_share(driver.id, 1))
        .unwrap();
    let mut request_ids = Vec::new();
    for i in 0..6 {
        let (rider, _) = seed_user(&first, &format!("rider{}@sp.senac.br", i), Role::User);
        request_ids.push(first.store.insert_request(share.id, rider.id, None).unwrap().id);
    }

    let apps = [app(first.clone()), app(second)];
    let handles: Vec<_> = request_ids
        .iter()
        .enumerate()
        .map(|(i, &id)| {
            let app = apps[i % 2].clone();
            let token = driver_token.clone();
            tokio::spawn(async move {
                call(
                    &app,
                    Method::PATCH,
                    &format!("/requests/{}/status", id),
                    Some(&token),
                    Some(json!({ "status": "APPROVED" })),
                )
                .await
                .0
            })
        })
        .collect();

    let mut approved = 0;
    for handle in handles {
        match handle.await.unwrap() {
            StatusCode::OK => approved += 1,
            StatusCode::BAD_REQUEST => {}
            other => panic!("unexpected status {}", other),
        }
    }

    assert_eq!(approved, 1);
    assert_eq!(first.store.find_share(share.id).unwrap().unwrap().spots, 0);
}
