// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Query, State},
    Json,
};

use crate::{
    models::{EventResponse, EventsQuery},
    state::AppState,
};

/// Events returned when the query has no `limit`.
const DEFAULT_EVENTS_LIMIT: usize = 100;

/// Most recent registry events, oldest first.
#[utoipa::path(
    get,
    path = "/v1/events",
    params(EventsQuery),
    tag = "Queries",
    responses((status = 200, body = [EventResponse]))
)]
pub async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Json<Vec<EventResponse>> {
    let limit = query.limit.unwrap_or(DEFAULT_EVENTS_LIMIT);
    let registry = state.registry.read().await;
    let events = registry
        .events()
        .recent(limit)
        .iter()
        .map(EventResponse::from)
        .collect();
    Json(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{relayer, signature, state};
    use crate::api::parse_signed;
    use crate::registry::message;
    use crate::registry::signature::test_support::signer;
    use crate::registry::ServiceName;

    #[tokio::test]
    async fn limit_keeps_most_recent() {
        let state = state();
        let alice = signer(0x11);
        for name in ["a", "b", "c"] {
            let payload = message::register_service(&ServiceName::parse(name).unwrap());
            let sig = signature(&state, &alice, &payload).await;
            let signed = parse_signed(&alice.address().to_string(), &sig).unwrap();
            state
                .registry
                .write()
                .await
                .register_service(relayer(), name, &signed)
                .unwrap();
        }

        let Json(events) =
            list_events(State(state), Query(EventsQuery { limit: Some(2) })).await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].data["name"], "b");
        assert_eq!(events[1].data["name"], "c");
        assert_eq!(events[1].kind, "service_registered");
        assert!(events[0].sequence < events[1].sequence);
    }
}
