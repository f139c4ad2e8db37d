mod common;

use axum::http::StatusCode;
use blog_admin::config::AdminSeed;
use blog_admin::error::AppError;
use blog_admin::password::verify_password;

use common::{test_app, ADMIN_EMAIL, ADMIN_PASSWORD};

#[test]
fn unknown_email_is_not_found() {
    let app = test_app();
    let err = app
        .state
        .auth
        .login("nobody@example.com", ADMIN_PASSWORD)
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert_eq!(err.status(), StatusCode::BAD_REQUEST);
}

#[test]
fn wrong_password_is_unauthorized() {
    let app = test_app();
    let err = app
        .state
        .auth
        .login(ADMIN_EMAIL, "not-the-password")
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidPassword));
    assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
}

#[test]
fn login_issues_a_token_for_the_user() {
    let app = test_app();
    let token = app.state.auth.login(ADMIN_EMAIL, ADMIN_PASSWORD).unwrap();
    let claims = app.state.auth.jwt().verify(&token.access_token).unwrap();
    assert_eq!(claims.user_id, app.admin_id);
    assert_eq!(claims.exp, token.expires_at);
}

#[test]
fn changed_password_replaces_the_old_one() {
    let app = test_app();
    app.state
        .users
        .update_password(app.admin_id, "brand-new-password")
        .unwrap();

    let hash = app.store.password_hash(app.admin_id);
    assert!(verify_password("brand-new-password", &hash));
    assert!(matches!(
        app.state.auth.login(ADMIN_EMAIL, ADMIN_PASSWORD),
        Err(AppError::InvalidPassword)
    ));
    assert!(app
        .state
        .auth
        .login(ADMIN_EMAIL, "brand-new-password")
        .is_ok());
}

#[test]
fn password_update_for_a_missing_user_is_not_found() {
    let app = test_app();
    let err = app
        .state
        .users
        .update_password(999, "brand-new-password")
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[test]
fn profile_exposes_name_and_email() {
    let app = test_app();
    let user = app.state.users.profile(app.admin_id).unwrap();
    assert_eq!(user.name, "Admin");
    assert_eq!(user.email, ADMIN_EMAIL);
}

#[test]
fn admin_seed_runs_once() {
    let app = test_app();
    let seed = AdminSeed {
        name: "Editor".into(),
        email: "editor@example.com".into(),
        password: "editor-password".into(),
    };

    assert!(app.state.users.ensure_admin(&seed).unwrap());
    assert!(!app.state.users.ensure_admin(&seed).unwrap());
    assert!(app
        .state
        .auth
        .login("editor@example.com", "editor-password")
        .is_ok());
}
