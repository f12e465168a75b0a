use axum::{
    extract::Request,
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::{
    domain::{ActorContext, ActorRole},
    error::AppError,
};

/// Authentication happens upstream (gateway/IdP); by the time a request
/// reaches this service the verified identity arrives as headers. This
/// middleware turns them into a typed ActorContext extension.
pub async fn require_actor(mut request: Request, next: Next) -> Result<Response, AppError> {
    let actor = actor_from_headers(request.headers())?;
    request.extensions_mut().insert(actor);
    Ok(next.run(request).await)
}

fn actor_from_headers(headers: &HeaderMap) -> Result<ActorContext, AppError> {
    let actor_id = headers
        .get("x-actor-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v).ok())
        .ok_or_else(|| AppError::Forbidden("Missing or invalid actor identity".to_string()))?;

    let role = headers
        .get("x-actor-role")
        .and_then(|v| v.to_str().ok())
        .and_then(ActorRole::parse)
        .ok_or_else(|| AppError::Forbidden("Missing or invalid actor role".to_string()))?;

    Ok(ActorContext { actor_id, role })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn parses_valid_headers() {
        let mut headers = HeaderMap::new();
        let id = Uuid::new_v4();
        headers.insert("x-actor-id", HeaderValue::from_str(&id.to_string()).unwrap());
        headers.insert("x-actor-role", HeaderValue::from_static("client"));
        let actor = actor_from_headers(&headers).unwrap();
        assert_eq!(actor.actor_id, id);
        assert_eq!(actor.role, ActorRole::Client);
    }

    #[test]
    fn rejects_unknown_role() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-actor-id",
            HeaderValue::from_str(&Uuid::new_v4().to_string()).unwrap(),
        );
        headers.insert("x-actor-role", HeaderValue::from_static("superuser"));
        assert!(actor_from_headers(&headers).is_err());
    }
}
