// src/web/routes.rs
use crate::{
    state::AppState,
    web::{admin_handlers, auth_handlers, booking_handlers, manager_handlers, mw_auth, mw_role, profile_handlers},
};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};

pub fn create_router(app_state: AppState) -> Router {
    // --- Rotas Públicas ---
    let public_routes = Router::new()
        .route("/login", get(auth_handlers::show_login_form).post(auth_handlers::handle_login))
        .route("/logout", get(auth_handlers::handle_logout))
        .route("/", get(auth_handlers::root_redirect));

    // --- Rotas de Admin ---
    // Exigem login E role admin
    let admin_routes = Router::new()
        .route("/dashboard", get(admin_handlers::dashboard_page))
        .route(
            "/clients",
            get(admin_handlers::clients_page).post(admin_handlers::handle_register_client),
        )
        .route("/clients/export", get(admin_handlers::export_usage_report))
        .route(
            "/clients/{id}",
            get(admin_handlers::client_profile_page).post(admin_handlers::handle_edit_client),
        )
        .route("/clients/{id}/renew", post(admin_handlers::handle_renew))
        .route("/clients/{id}/delete", post(admin_handlers::handle_delete_client))
        .route(
            "/clients/{id}/slots/{slot}/cancel",
            post(admin_handlers::handle_cancel_client_slot),
        )
        .route(
            "/slots",
            get(admin_handlers::slots_page).post(admin_handlers::handle_create_slot),
        )
        .route("/slots/{id}/delete", post(admin_handlers::handle_delete_slot))
        .route("/slots/{id}/capacity", post(admin_handlers::handle_update_capacity))
        .route("/slots/{id}/clients", post(admin_handlers::handle_add_client_to_slot))
        // Aplica APENAS o guard de admin aqui (require_auth vem do router pai)
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            mw_role::require_admin,
        ));

    // --- Rotas do Gestor ---
    let manager_routes = Router::new()
        .route("/crm", get(manager_handlers::crm_page))
        .route("/crm/{id}/notes", post(manager_handlers::handle_add_note))
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            mw_role::require_manager,
        ));

    // --- Rotas Autenticadas ---
    // Exigem *pelo menos* uma credencial válida
    let authenticated_routes = Router::new()
        .route("/appointments", get(booking_handlers::appointments_page))
        .route("/appointments/{id}/book", post(booking_handlers::handle_book))
        .route("/appointments/{id}/cancel", post(booking_handlers::handle_cancel))
        .route("/calendar", get(booking_handlers::calendar_page))
        .route("/my-profile", get(profile_handlers::my_profile_page))
        .route("/my-profile/email", post(profile_handlers::handle_change_email))
        .route("/my-profile/password", post(profile_handlers::handle_change_password))
        .nest("/admin", admin_routes)
        .nest("/manager", manager_routes)
        // require_auth corre antes dos guards de papel (incluindo /admin/* e /manager/*)
        .route_layer(middleware::from_fn(mw_auth::require_auth));

    // --- Router Final ---
    Router::new()
        .merge(public_routes)
        .merge(authenticated_routes)
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::api_client::ApiClient;
    use axum::{
        body::{to_bytes, Body},
        http::{header::LOCATION, Request, StatusCode},
    };
    use sqlx::sqlite::SqlitePoolOptions;
    use std::time::Duration;
    use tower::ServiceExt;
    use tower_sessions::SessionManagerLayer;
    use tower_sessions_sqlx_store::SqliteStore;

    // Backend inexistente: nenhuma destas rotas deve chegar a chamá-lo
    async fn test_app() -> Router {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = SqliteStore::new(pool);
        store.migrate().await.unwrap();
        let api = ApiClient::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        create_router(AppState { api }).layer(SessionManagerLayer::new(store).with_secure(false))
    }

    async fn get_path(path: &str) -> axum::response::Response {
        test_app()
            .await
            .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn protected_pages_redirect_to_login_without_session() {
        for path in ["/appointments", "/calendar", "/my-profile", "/admin/dashboard", "/manager/crm"] {
            let response = get_path(path).await;
            assert!(response.status().is_redirection(), "{}", path);
            assert_eq!(response.headers().get(LOCATION).unwrap(), "/login", "{}", path);
        }
    }

    #[tokio::test]
    async fn root_without_session_goes_to_login() {
        let response = get_path("/").await;
        assert_eq!(response.headers().get(LOCATION).unwrap(), "/login");
    }

    #[tokio::test]
    async fn login_page_renders() {
        let response = get_path("/login").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&body).contains("name=\"password\""));
    }
}
