use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use fanzone_server::config::BootstrapAdminConfig;
use fanzone_server::db::Role;
use fanzone_server::{configure_routes, AppState, Settings};
use serde_json::{json, Value};

async fn test_state() -> AppState {
    let mut config = Settings::for_testing();
    config.auth.bootstrap_super_admin = Some(BootstrapAdminConfig {
        name: "Root".into(),
        email: "root@fanzone.io".into(),
        password: "rootpass".into(),
    });
    let state = AppState::new(config).await.unwrap();
    state.bootstrap().await.unwrap();
    state
}

macro_rules! spawn_app {
    ($state:expr) => {{
        let codec = $state.codec.clone();
        test::init_service(
            App::new()
                .app_data(web::Data::new($state.clone()))
                .configure(move |cfg| configure_routes(cfg, codec)),
        )
        .await
    }};
}

/// Status of a request whether the handler or a middleware produced it.
macro_rules! status_of {
    ($app:expr, $req:expr) => {
        match test::try_call_service(&$app, $req).await {
            Ok(resp) => resp.status(),
            Err(err) => err.as_response_error().status_code(),
        }
    };
}

macro_rules! post_json {
    ($app:expr, $uri:expr, $body:expr) => {{
        let resp = test::TestRequest::post()
            .uri($uri)
            .set_json($body)
            .send_request(&$app)
            .await;
        let status = resp.status();
        let body: Value = test::read_body_json(resp).await;
        (status, body)
    }};
}

macro_rules! login {
    ($app:expr, $email:expr, $password:expr) => {{
        let (status, body) = post_json!($app, "/auth/login", json!({ "email": $email, "password": $password }));
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        body
    }};
}

fn bearer(token: &Value) -> (String, String) {
    (
        "Authorization".to_string(),
        format!("Bearer {}", token.as_str().unwrap()),
    )
}

#[actix_web::test]
async fn test_health_check() {
    let state = test_state().await;
    let app = spawn_app!(state);

    let req = test::TestRequest::get().uri("/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "healthy");
    assert!(body["timestamp"].is_string());
}

#[actix_web::test]
async fn test_register_login_refresh_logout_scenario() {
    let state = test_state().await;
    let app = spawn_app!(state);

    let (status, body) = post_json!(
        app,
        "/auth/register",
        json!({ "name": "Abebe", "email": "a@x.com", "password": "secret1" })
    );
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "User registered successfully");
    assert_eq!(body["user"]["role"], "user");
    assert!(body["user"].get("password_hash").is_none());
    let user_id = body["user"]["id"].as_str().unwrap().to_string();

    let tokens = login!(app, "a@x.com", "secret1");
    let access = tokens["access_token"].as_str().unwrap();
    let refresh_token = tokens["refresh_token"].as_str().unwrap().to_string();
    assert_eq!(tokens["user"]["email"], "a@x.com");

    let claims = state.codec.verify_access(access).unwrap();
    assert_eq!(claims.sub.to_string(), user_id);
    assert_eq!(claims.role, Role::User);

    let (status, body) = post_json!(app, "/auth/refresh", json!({ "refresh_token": refresh_token }));
    assert_eq!(status, StatusCode::OK);
    let renewed = state
        .codec
        .verify_access(body["access_token"].as_str().unwrap())
        .unwrap();
    assert_eq!(renewed.sub, claims.sub);
    assert_eq!(renewed.role, Role::User);

    let (status, body) = post_json!(app, "/auth/logout", json!({ "refresh_token": refresh_token }));
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Successfully logged out");

    let (status, body) = post_json!(app, "/auth/refresh", json!({ "refresh_token": refresh_token }));
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["status"], 401);
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("Session revoked"));
}

#[actix_web::test]
async fn test_logout_is_idempotent() {
    let state = test_state().await;
    let app = spawn_app!(state);

    post_json!(
        app,
        "/auth/register",
        json!({ "name": "B", "email": "b@x.com", "password": "secret1" })
    );
    let tokens = login!(app, "b@x.com", "secret1");
    let refresh_token = tokens["refresh_token"].clone();

    for _ in 0..2 {
        let (status, _) = post_json!(app, "/auth/logout", json!({ "refresh_token": refresh_token }));
        assert_eq!(status, StatusCode::OK);
    }
}

#[actix_web::test]
async fn test_bad_credentials_look_identical() {
    let state = test_state().await;
    let app = spawn_app!(state);

    post_json!(
        app,
        "/auth/register",
        json!({ "name": "C", "email": "c@x.com", "password": "secret1" })
    );

    let (wrong_status, wrong_body) =
        post_json!(app, "/auth/login", json!({ "email": "c@x.com", "password": "nope123" }));
    let (unknown_status, unknown_body) =
        post_json!(app, "/auth/login", json!({ "email": "ghost@x.com", "password": "secret1" }));

    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_status, unknown_status);
    assert_eq!(wrong_body, unknown_body);
}

#[actix_web::test]
async fn test_registration_validation() {
    let state = test_state().await;
    let app = spawn_app!(state);

    let cases = [
        json!({ "name": "D", "email": "d@x.com", "password": "short" }),
        json!({ "name": "", "email": "d@x.com", "password": "secret1" }),
        json!({ "name": "D", "email": "not-an-email", "password": "secret1" }),
        json!({ "name": "D", "email": "d@x.com", "password": "secret1", "language": "fr" }),
        json!({ "email": "d@x.com", "password": "secret1" }),
    ];
    for case in cases {
        let (status, body) = post_json!(app, "/auth/register", case.clone());
        assert_eq!(status, StatusCode::BAD_REQUEST, "accepted {}", case);
        assert_eq!(body["error"]["status"], 400);
    }

    let (status, _) = post_json!(
        app,
        "/auth/register",
        json!({ "name": "D", "email": "D@x.com", "password": "secret1" })
    );
    assert_eq!(status, StatusCode::CREATED);

    // Emails are case-insensitive and shared with the admin space.
    for email in ["d@x.com", "ROOT@fanzone.io"] {
        let (status, body) = post_json!(
            app,
            "/auth/register",
            json!({ "name": "D", "email": email, "password": "secret1" })
        );
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["message"], "Email already exists");
    }
}

#[actix_web::test]
async fn test_profile_routes_require_token() {
    let state = test_state().await;
    let app = spawn_app!(state);

    let req = test::TestRequest::get().uri("/users/me").to_request();
    assert_eq!(status_of!(app, req), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::get()
        .uri("/users/me")
        .insert_header(("Authorization", "Bearer not.a.token"))
        .to_request();
    assert_eq!(status_of!(app, req), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_profile_update_flow() {
    let state = test_state().await;
    let app = spawn_app!(state);

    post_json!(
        app,
        "/auth/register",
        json!({ "name": "Eden", "email": "e@x.com", "password": "secret1", "language": "am" })
    );
    let tokens = login!(app, "e@x.com", "secret1");
    let auth = bearer(&tokens["access_token"]);

    let req = test::TestRequest::get()
        .uri("/users/me")
        .insert_header(auth.clone())
        .to_request();
    let me: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(me["name"], "Eden");
    assert_eq!(me["language"], "am");

    let req = test::TestRequest::put()
        .uri("/users/me")
        .insert_header(auth.clone())
        .set_json(json!({ "name": "Eden T" }))
        .to_request();
    let me: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(me["name"], "Eden T");
    assert_eq!(me["language"], "am");

    let req = test::TestRequest::put()
        .uri("/users/me")
        .insert_header(auth.clone())
        .set_json(json!({}))
        .to_request();
    assert_eq!(status_of!(app, req), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::put()
        .uri("/users/me")
        .insert_header(auth.clone())
        .set_json(json!({ "nickname": "E" }))
        .to_request();
    assert_eq!(status_of!(app, req), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::patch()
        .uri("/users/me/language")
        .insert_header(auth.clone())
        .set_json(json!({ "language": "om" }))
        .to_request();
    let me: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(me["language"], "om");

    let req = test::TestRequest::put()
        .uri("/users/me/password")
        .insert_header(auth.clone())
        .set_json(json!({ "current_password": "wrong1", "new_password": "secret2" }))
        .to_request();
    assert_eq!(status_of!(app, req), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::put()
        .uri("/users/me/password")
        .insert_header(auth)
        .set_json(json!({ "current_password": "secret1", "new_password": "secret2" }))
        .to_request();
    assert_eq!(status_of!(app, req), StatusCode::OK);

    // The session issued before the change is still usable.
    let (status, _) = post_json!(app, "/auth/refresh", json!({ "refresh_token": tokens["refresh_token"] }));
    assert_eq!(status, StatusCode::OK);

    let (status, _) = post_json!(app, "/auth/login", json!({ "email": "e@x.com", "password": "secret1" }));
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    login!(app, "e@x.com", "secret2");
}

#[actix_web::test]
async fn test_role_gates() {
    let state = test_state().await;
    let app = spawn_app!(state);

    post_json!(
        app,
        "/auth/register",
        json!({ "name": "Fan", "email": "fan@x.com", "password": "secret1" })
    );
    let user = login!(app, "fan@x.com", "secret1");
    let root = login!(app, "root@fanzone.io", "rootpass");
    assert_eq!(root["user"]["role"], "super_admin");
    assert!(root["user"].get("language").is_none());

    // A plain user is turned away from both gated tiers.
    for uri in ["/admin/users", "/super-admin/admins"] {
        let req = test::TestRequest::get()
            .uri(uri)
            .insert_header(bearer(&user["access_token"]))
            .to_request();
        assert_eq!(status_of!(app, req), StatusCode::FORBIDDEN);
    }

    // Super admins pass the admin gate.
    let req = test::TestRequest::get()
        .uri("/admin/users")
        .insert_header(bearer(&root["access_token"]))
        .to_request();
    let users: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(users.as_array().unwrap().len(), 1);

    let req = test::TestRequest::post()
        .uri("/super-admin/register-admin")
        .insert_header(bearer(&root["access_token"]))
        .set_json(json!({ "name": "Mod", "email": "mod@x.com", "password": "modpass" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Value = test::read_body_json(resp).await;
    assert_eq!(created["admin"]["role"], "admin");

    let admin = login!(app, "mod@x.com", "modpass");

    let req = test::TestRequest::get()
        .uri("/admin/users")
        .insert_header(bearer(&admin["access_token"]))
        .to_request();
    assert_eq!(status_of!(app, req), StatusCode::OK);

    let req = test::TestRequest::get()
        .uri("/super-admin/admins")
        .insert_header(bearer(&admin["access_token"]))
        .to_request();
    assert_eq!(status_of!(app, req), StatusCode::FORBIDDEN);

    let req = test::TestRequest::get()
        .uri("/super-admin/admins")
        .insert_header(bearer(&root["access_token"]))
        .to_request();
    let admins: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(admins.as_array().unwrap().len(), 2);

    // Admins have no language to set.
    let req = test::TestRequest::patch()
        .uri("/users/me/language")
        .insert_header(bearer(&admin["access_token"]))
        .set_json(json!({ "language": "en" }))
        .to_request();
    assert_eq!(status_of!(app, req), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_languages_are_public() {
    let state = test_state().await;
    let app = spawn_app!(state);

    let req = test::TestRequest::get().uri("/languages").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["total"], 3);
    assert_eq!(
        body["languages"],
        json!([
            { "code": "en", "name": "English" },
            { "code": "am", "name": "Amharic" },
            { "code": "om", "name": "Oromo" }
        ])
    );
}

#[actix_web::test]
async fn test_favorite_club_update() {
    let state = test_state().await;
    let app = spawn_app!(state);

    let club = "6f1c2a4e-8b1d-4c3a-9e2f-0a1b2c3d4e5f";
    let req = test::TestRequest::patch()
        .uri("/users/me/favorite-club")
        .set_json(json!({ "fav_club_id": club }))
        .to_request();
    assert_eq!(status_of!(app, req), StatusCode::UNAUTHORIZED);

    post_json!(
        app,
        "/auth/register",
        json!({ "name": "Gadaa", "email": "g@x.com", "password": "secret1" })
    );
    let user = login!(app, "g@x.com", "secret1");

    let req = test::TestRequest::patch()
        .uri("/users/me/favorite-club")
        .insert_header(bearer(&user["access_token"]))
        .set_json(json!({ "fav_club_id": club }))
        .to_request();
    let me: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(me["fav_club_id"], club);
    assert_eq!(me["name"], "Gadaa");

    let req = test::TestRequest::patch()
        .uri("/users/me/favorite-club")
        .insert_header(bearer(&user["access_token"]))
        .set_json(json!({ "fav_club_id": "not-a-uuid" }))
        .to_request();
    assert_eq!(status_of!(app, req), StatusCode::BAD_REQUEST);

    let root = login!(app, "root@fanzone.io", "rootpass");
    let req = test::TestRequest::patch()
        .uri("/users/me/favorite-club")
        .insert_header(bearer(&root["access_token"]))
        .set_json(json!({ "fav_club_id": club }))
        .to_request();
    assert_eq!(status_of!(app, req), StatusCode::BAD_REQUEST);
}
