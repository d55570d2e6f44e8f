use axum::{
    body::Bytes,
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::errors::GadgetError;
use crate::services::gadget_service;
use crate::state::gadgets::{Gadget, GadgetStore, NewGadget};

/// Body of `POST /gadgets/:id/rent`.
#[derive(Debug, Default, Deserialize)]
pub struct RentRequest {
    #[serde(default)]
    pub renter: Option<String>,
}

/// Build all gadget routes under /gadgets
pub fn routes(store: GadgetStore) -> Router {
    Router::new()
        .route("/", get(list_gadgets).post(create_gadget))
        .route("/:id", get(get_gadget).delete(delete_gadget))
        .route("/:id/rent", post(rent_gadget))
        .route("/:id/return", post(return_gadget))
        .with_state(store)
}

//
// ─────────────────────────────────────────────────────────────
// POST /gadgets
// List a new gadget for rent. Any body is accepted, with or
// without a JSON content type; what is not a JSON object
// becomes an empty draft.
// ─────────────────────────────────────────────────────────────
//
async fn create_gadget(
    State(store): State<GadgetStore>,
    body: Bytes,
) -> Json<Gadget>
{
    let draft = NewGadget::from_body(&body);
    Json(gadget_service::create(&store, draft).await)
}

//
// ─────────────────────────────────────────────────────────────
// GET /gadgets
// ─────────────────────────────────────────────────────────────
//
async fn list_gadgets(
    State(store): State<GadgetStore>,
) -> Json<Vec<Gadget>>
{
    Json(gadget_service::list(&store).await)
}

//
// ─────────────────────────────────────────────────────────────
// GET /gadgets/{id}
// Return the gadget or 404
// ─────────────────────────────────────────────────────────────
//
async fn get_gadget(
    Path(id): Path<String>,
    State(store): State<GadgetStore>,
) -> Result<Json<Gadget>, GadgetError>
{
    gadget_service::get(&store, &id).await.map(Json)
}

//
// ─────────────────────────────────────────────────────────────
// POST /gadgets/{id}/rent
// A missing or unparsable body is treated as "no renter", so the
// 404 / not-available checks still come first.
// ─────────────────────────────────────────────────────────────
//
async fn rent_gadget(
    Path(id): Path<String>,
    State(store): State<GadgetStore>,
    body: Option<Json<RentRequest>>,
) -> Result<Json<Gadget>, GadgetError>
{
    let renter = body.and_then(|Json(req)| req.renter);
    gadget_service::rent(&store, &id, renter).await.map(Json)
}

//
// ─────────────────────────────────────────────────────────────
// POST /gadgets/{id}/return
// ─────────────────────────────────────────────────────────────
//
async fn return_gadget(
    Path(id): Path<String>,
    State(store): State<GadgetStore>,
) -> Result<Json<Gadget>, GadgetError>
{
    gadget_service::return_gadget(&store, &id).await.map(Json)
}

//
// ─────────────────────────────────────────────────────────────
// DELETE /gadgets/{id}
// Return the removed gadget, 400 if there was none
// ─────────────────────────────────────────────────────────────
//
async fn delete_gadget(
    Path(id): Path<String>,
    State(store): State<GadgetStore>,
) -> Result<Json<Gadget>, GadgetError>
{
    gadget_service::delete(&store, &id).await.map(Json)
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
        Router,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::state::gadgets::GadgetStore;

    fn app() -> Router {
        Router::new().nest("/gadgets", super::routes(GadgetStore::in_memory()))
    }

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
        let mut req = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(v) => {
                req = req.header(header::CONTENT_TYPE, "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };

        let res = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    fn json_of(bytes: &[u8]) -> Value {
        serde_json::from_slice(bytes).unwrap()
    }

    fn text_of(bytes: &[u8]) -> String {
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn rental_lifecycle() {
        let app = app();

        // 1. create
        let (status, body) = call(
            &app,
            Method::POST,
            "/gadgets",
            Some(json!({ "name": "Drill", "pricePerDay": 5, "owner": "alice" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let created = json_of(&body);
        let id = created["id"].as_str().unwrap().to_string();
        assert_eq!(created["availability"], true);
        assert_eq!(created["rentedBy"], Value::Null);
        assert_eq!(created["owner"], "alice");

        // 2. rent
        let (status, body) = call(
            &app,
            Method::POST,
            &format!("/gadgets/{id}/rent"),
            Some(json!({ "renter": "bob" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let rented = json_of(&body);
        assert_eq!(rented["availability"], false);
        assert_eq!(rented["rentedBy"], "bob");
        assert!(rented["updatedAt"].is_string());

        // 3. rent again
        let (status, body) = call(
            &app,
            Method::POST,
            &format!("/gadgets/{id}/rent"),
            Some(json!({ "renter": "carol" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(text_of(&body), format!("Gadget with id={id} is not available"));

        // 4. return
        let (status, body) = call(&app, Method::POST, &format!("/gadgets/{id}/return"), None).await;
        assert_eq!(status, StatusCode::OK);
        let returned = json_of(&body);
        assert_eq!(returned["availability"], true);
        assert_eq!(returned["rentedBy"], Value::Null);

        // 5. delete, then get
        let (status, body) = call(&app, Method::DELETE, &format!("/gadgets/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_of(&body)["id"], id.as_str());

        let (status, body) = call(&app, Method::GET, &format!("/gadgets/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(text_of(&body), format!("Gadget with id={id} not found"));
    }

    #[tokio::test]
    async fn unknown_id_is_404() {
        let (status, body) = call(&app(), Method::GET, "/gadgets/unknown-id", None).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(text_of(&body), "Gadget with id=unknown-id not found");
    }

    #[tokio::test]
    async fn delete_of_unknown_id_is_400() {
        let (status, body) = call(&app(), Method::DELETE, "/gadgets/ghost", None).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(text_of(&body), "Gadget with id=ghost not found");
    }

    #[tokio::test]
    async fn rent_of_unknown_id_is_404_even_without_body() {
        let (status, _) = call(&app(), Method::POST, "/gadgets/ghost/rent", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn return_of_available_gadget_is_400() {
        let app = app();
        let (_, body) = call(&app, Method::POST, "/gadgets", Some(json!({}))).await;
        let id = json_of(&body)["id"].as_str().unwrap().to_string();

        let (status, body) = call(&app, Method::POST, &format!("/gadgets/{id}/return"), None).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(text_of(&body), format!("Gadget with id={id} is not rented"));
    }

    #[tokio::test]
    async fn rent_without_renter_is_400() {
        let app = app();
        let (_, body) = call(&app, Method::POST, "/gadgets", Some(json!({ "name": "Tent" }))).await;
        let id = json_of(&body)["id"].as_str().unwrap().to_string();

        let (status, _) = call(&app, Method::POST, &format!("/gadgets/{id}/rent"), Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, body) = call(&app, Method::GET, &format!("/gadgets/{id}"), None).await;
        assert_eq!(json_of(&body)["availability"], true);
    }

    #[tokio::test]
    async fn create_ignores_server_owned_fields() {
        let (status, body) = call(
            &app(),
            Method::POST,
            "/gadgets",
            Some(json!({
                "id": "mine",
                "availability": false,
                "rentedBy": "mallory",
                "name": "Kayak",
                "color": "orange"
            })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let created = json_of(&body);
        assert_ne!(created["id"], "mine");
        assert_eq!(created["availability"], true);
        assert_eq!(created["rentedBy"], Value::Null);
        assert_eq!(created["color"], "orange");
    }

    #[tokio::test]
    async fn list_returns_all_gadgets() {
        let app = app();
        for name in ["Drill", "Saw", "Ladder"] {
            call(&app, Method::POST, "/gadgets", Some(json!({ "name": name }))).await;
        }

        let (status, body) = call(&app, Method::GET, "/gadgets", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_of(&body).as_array().unwrap().len(), 3);
    }

    async fn post_raw(app: &Router, body: &'static str) -> (StatusCode, Value) {
        let req = Request::post("/gadgets").body(Body::from(body)).unwrap();
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, json_of(&bytes))
    }

    #[tokio::test]
    async fn create_without_body_still_lists_gadget() {
        let app = app();

        let (status, created) = post_raw(&app, "").await;

        assert_eq!(status, StatusCode::OK);
        assert!(created["id"].is_string());
        assert_eq!(created["availability"], true);
        assert_eq!(created["rentedBy"], Value::Null);

        let (_, body) = call(&app, Method::GET, "/gadgets", None).await;
        assert_eq!(json_of(&body).as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn create_reads_json_without_content_type() {
        let (status, created) = post_raw(&app(), r#"{ "name": "Drill" }"#).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(created["name"], "Drill");
    }

    #[tokio::test]
    async fn create_stores_fields_as_sent() {
        let (status, body) = call(
            &app(),
            Method::POST,
            "/gadgets",
            Some(json!({ "name": "Drill", "pricePerDay": "5" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_of(&body)["pricePerDay"], "5");

        let (status, body) = call(
            &app(),
            Method::POST,
            "/gadgets",
            Some(json!({ "pricePerDay": 5 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let text = text_of(&body);
        assert!(text.contains(r#""pricePerDay":5"#));
        assert!(!text.contains(r#""pricePerDay":5.0"#));
    }
}
