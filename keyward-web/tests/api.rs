//! End-to-end API tests over the in-memory identity store

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use keyward_core::{
    seed_roles, ClaimEntry, IdentityStore, JwtConfig, MemoryIdentityStore, NewUser, Policy,
};
use keyward_web::{create_app, AppState, WebConfig};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn test_config() -> WebConfig {
    WebConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        database_url: None,
        jwt: JwtConfig::new("test-secret-do-not-use", "keyward", "keyward-clients").unwrap(),
    }
}

fn test_state(store: Arc<MemoryIdentityStore>) -> AppState {
    AppState::with_store(test_config(), store).unwrap()
}

fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

async fn register(app: Router, username: &str, email: &str) -> String {
    let (status, body) = send(
        app,
        request(
            "POST",
            "/auth/register",
            None,
            Some(json!({
                "username": username,
                "email": email,
                "password": "password123"
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_register_login_and_wrong_password() {
    let store = Arc::new(MemoryIdentityStore::new());
    let state = test_state(store);

    register(create_app(state.clone()), "alice", "alice@example.com").await;

    let (status, body) = send(
        create_app(state.clone()),
        request(
            "POST",
            "/auth/login",
            None,
            Some(json!({ "username": "alice", "password": "password123" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].is_string());

    let (status, body) = send(
        create_app(state.clone()),
        request(
            "POST",
            "/auth/login",
            None,
            Some(json!({ "username": "alice", "password": "wrong" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "wrong_password");

    let (status, body) = send(
        create_app(state),
        request(
            "POST",
            "/auth/login",
            None,
            Some(json!({ "username": "nobody", "password": "password123" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "user_not_found");
}

#[tokio::test]
async fn test_user_crud_and_missing_user_is_404() {
    let store = Arc::new(MemoryIdentityStore::new());
    let state = test_state(store.clone());

    let (status, _) = send(
        create_app(state.clone()),
        request(
            "POST",
            "/users/create",
            None,
            Some(json!({
                "username": "bob",
                "email": "bob@example.com",
                "password": "password123"
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) =
        send(create_app(state.clone()), request("GET", "/users/users", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["username"], "bob");

    let bob = store.find_by_username("bob").await.unwrap().unwrap();
    let (status, _) = send(
        create_app(state.clone()),
        request(
            "PUT",
            &format!("/users/update/{}", bob.id),
            None,
            Some(json!({ "username": "bobby", "email": "bobby@example.com" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(store.find_by_username("bobby").await.unwrap().is_some());

    let (status, _) = send(
        create_app(state.clone()),
        request(
            "PUT",
            "/users/update/no-such-id",
            None,
            Some(json!({ "username": "x", "email": "x@example.com" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        create_app(state.clone()),
        request(
            "PUT",
            &format!("/users/update/{}", bob.id),
            None,
            Some(json!({ "username": "", "email": "not-an-email" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_failed");

    let (status, _) = send(
        create_app(state.clone()),
        request("DELETE", &format!("/users/delete/{}", bob.id), None, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        create_app(state),
        request("DELETE", &format!("/users/delete/{}", bob.id), None, None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_role_assignment_endpoints() {
    let store = Arc::new(MemoryIdentityStore::new());
    seed_roles(store.as_ref()).await.unwrap();
    // A second run must not duplicate anything
    seed_roles(store.as_ref()).await.unwrap();

    let state = test_state(store.clone());
    register(create_app(state.clone()), "carol", "carol@example.com").await;
    let carol = store.find_by_username("carol").await.unwrap().unwrap();

    let (status, body) = send(
        create_app(state.clone()),
        request("GET", "/users/roles", None, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Admin", "User"]);

    let (status, body) = send(
        create_app(state.clone()),
        request(
            "POST",
            "/users/add-role",
            None,
            Some(json!({ "userId": carol.id, "roleName": "Admin" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Role added to user!");
    assert_eq!(store.user_roles(&carol.id).await.unwrap(), vec!["Admin"]);

    let (status, _) = send(
        create_app(state.clone()),
        request(
            "POST",
            "/users/add-role",
            None,
            Some(json!({ "userId": carol.id, "roleName": "Ghost" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        create_app(state),
        request(
            "POST",
            "/users/remove-role",
            None,
            Some(json!({ "userId": carol.id, "roleName": "Admin" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Role removed from user!");
    assert!(store.user_roles(&carol.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_claim_endpoints_require_admin() {
    let store = Arc::new(MemoryIdentityStore::new());
    seed_roles(store.as_ref()).await.unwrap();
    let state = test_state(store.clone());

    register(create_app(state.clone()), "dave", "dave@example.com").await;
    let claim_body = json!({
        "email": "dave@example.com",
        "claimType": "Tempo",
        "claimValue": "Inserir"
    });

    // Anonymous caller
    let (status, _) = send(
        create_app(state.clone()),
        request("POST", "/users/add-claim", None, Some(claim_body.clone())),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Authenticated but not an administrator
    let user_token = register(create_app(state.clone()), "erin", "erin@example.com").await;
    let (status, body) = send(
        create_app(state.clone()),
        request(
            "POST",
            "/users/add-claim",
            Some(&user_token),
            Some(claim_body.clone()),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    // Administrator
    let admin = store.find_by_username("erin").await.unwrap().unwrap();
    store.add_to_role(&admin.id, "Admin").await.unwrap();
    let admin_token = state
        .tokens
        .issue(store.as_ref(), &admin)
        .await
        .unwrap();

    let (status, body) = send(
        create_app(state.clone()),
        request(
            "POST",
            "/users/add-claim",
            Some(&admin_token),
            Some(claim_body.clone()),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Claim added successfully.");

    let (status, body) = send(
        create_app(state.clone()),
        request("GET", "/users/claims/dave@example.com", None, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["claim_type"], "Tempo");
    assert_eq!(body[0]["claim_value"], "Inserir");

    let (status, body) = send(
        create_app(state.clone()),
        request(
            "DELETE",
            "/users/remove-claim",
            Some(&admin_token),
            Some(claim_body),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Claim removed successfully.");

    let (status, body) = send(
        create_app(state),
        request("GET", "/users/claims/ghost@example.com", None, None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "user_not_found");
}

#[tokio::test]
async fn test_issued_token_carries_roles_and_projected_claims() {
    let store = Arc::new(MemoryIdentityStore::new());
    seed_roles(store.as_ref()).await.unwrap();
    store
        .add_role_claim("Admin", ClaimEntry::new("Inserir", "true"))
        .await
        .unwrap();

    let state = test_state(store.clone());
    let alice = store
        .create_user(NewUser {
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password: "password123".to_string(),
        })
        .await
        .unwrap();
    store.add_to_role(&alice.id, "Admin").await.unwrap();

    let (status, body) = send(
        create_app(state.clone()),
        request(
            "POST",
            "/auth/login",
            None,
            Some(json!({ "username": "alice", "password": "password123" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let token = body["token"].as_str().unwrap();
    let claims = state.tokens.verify(token).unwrap();

    assert_eq!(claims.sub, alice.id);
    assert_eq!(claims.name, "alice");
    assert!(!claims.jti.is_empty());
    assert!(claims.has_role("Admin"));
    assert!(claims.has_claim("Inserir", "true"));

    let policy = Policy::new()
        .require_role("Admin")
        .require_claim("Inserir", "true");
    assert!(policy.allows(&claims));
}
