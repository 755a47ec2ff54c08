// src/services/slot_directory.rs
use crate::{
    models::{
        slot::Slot,
        subject::{SlotScope, Subject},
    },
    services::api_client::{ApiClient, ApiError},
};

/// Lista de horários visíveis para o subject. Clientes só veem os do seu admin.
pub async fn fetch_for(api: &ApiClient, token: &str, subject: &Subject) -> Result<Vec<Slot>, ApiError> {
    let tenant = match subject.slot_scope() {
        SlotScope::All => None,
        SlotScope::Tenant(admin_id) => Some(admin_id),
        SlotScope::Unowned => {
            // Cliente sem admin: nada a pedir ao backend
            tracing::warn!("Cliente {} sem admin associado; sem horários.", subject.id);
            return Ok(Vec::new());
        }
    };
    tracing::debug!("A buscar horários para {} (tenant: {:?})", subject.id, tenant);
    let slots = api.list_slots(token, tenant).await?;
    tracing::debug!("{} horários recebidos.", slots.len());
    Ok(slots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::api_client::tests::spawn_backend;
    use axum::{extract::RawQuery, routing::get, Json, Router};
    use serde_json::json;
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        time::Duration,
    };

    // Backend que conta os pedidos e devolve a query recebida como id do slot
    async fn counting_backend(calls: Arc<AtomicUsize>) -> ApiClient {
        let app = Router::new().route(
            "/api/admin/slots",
            get(move |RawQuery(query): RawQuery| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Json(json!([{ "_id": query.unwrap_or_default(), "date": "2030-01-01", "time": "10:00" }]))
                }
            }),
        );
        ApiClient::new(spawn_backend(app).await, Duration::from_secs(5)).unwrap()
    }

    fn subject(json: serde_json::Value) -> Subject {
        serde_json::from_value(json).unwrap()
    }

    #[tokio::test]
    async fn client_listing_is_scoped_to_its_admin() {
        let calls = Arc::new(AtomicUsize::new(0));
        let api = counting_backend(calls.clone()).await;

        let slots = fetch_for(&api, "t", &subject(json!({ "_id": "c1", "role": "client", "adminId": "a7" })))
            .await
            .unwrap();
        assert_eq!(slots[0].id, "adminId=a7");

        let slots = fetch_for(&api, "t", &subject(json!({ "_id": "a1", "role": "admin" })))
            .await
            .unwrap();
        assert_eq!(slots[0].id, "");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn client_without_admin_gets_nothing_and_backend_is_not_called() {
        let calls = Arc::new(AtomicUsize::new(0));
        let api = counting_backend(calls.clone()).await;

        let slots = fetch_for(&api, "t", &subject(json!({ "_id": "c9", "role": "client" })))
            .await
            .unwrap();
        assert!(slots.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
