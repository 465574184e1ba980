//! Roaster CRUD. Each roaster belongs to the user who created it.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::{
    AppState,
    api::models::{
        roasters::{ListRoastersQuery, RoasterRequest, RoasterResponse},
        users::CurrentUser,
    },
    db::{
        handlers::{Repository, Roasters, roasters::RoasterFilter},
        models::roasters::{RoasterCreateDBRequest, RoasterUpdateDBRequest},
    },
    errors::Error,
    types::RoasterId,
};

/// Trimmed name plus optional fields with blanks dropped.
fn normalize(request: RoasterRequest) -> Result<RoasterUpdateDBRequest, Error> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(Error::BadRequest {
            message: "Roaster name is required".to_string(),
        });
    }
    let non_blank = |value: Option<String>| value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    Ok(RoasterUpdateDBRequest {
        name: name.to_string(),
        website: non_blank(request.website),
        description: non_blank(request.description),
    })
}

fn not_found(id: RoasterId) -> Error {
    Error::NotFound {
        resource: "Roaster".to_string(),
        id: id.to_string(),
    }
}

/// List roasters
///
/// Members see their own roasters. Admins see everyone's, optionally filtered by `owner_id`.
#[utoipa::path(
    get,
    path = "/api/roasters",
    tag = "roasters",
    params(ListRoastersQuery),
    responses(
        (status = 200, description = "Roasters", body = [RoasterResponse]),
        (status = 401, description = "Not signed in"),
    )
)]
#[tracing::instrument(skip_all, fields(user_id = current_user.id))]
pub async fn list_roasters(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ListRoastersQuery>,
) -> Result<Json<Vec<RoasterResponse>>, Error> {
    let owner_id = if current_user.is_admin() {
        query.owner_id
    } else {
        Some(current_user.id)
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let roasters = Roasters::new(&mut conn)
        .list(&RoasterFilter {
            owner_id,
            skip: query.skip(),
            limit: query.limit(),
        })
        .await?;

    Ok(Json(roasters.into_iter().map(RoasterResponse::from).collect()))
}

/// Create a roaster owned by the signed-in user
#[utoipa::path(
    post,
    path = "/api/roaster",
    request_body = RoasterRequest,
    tag = "roasters",
    responses(
        (status = 201, description = "Roaster created", body = RoasterResponse),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Not signed in"),
    )
)]
#[tracing::instrument(skip_all, fields(user_id = current_user.id))]
pub async fn create_roaster(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<RoasterRequest>,
) -> Result<(StatusCode, Json<RoasterResponse>), Error> {
    let fields = normalize(request)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let roaster = Roasters::new(&mut conn)
        .create(&RoasterCreateDBRequest {
            owner_id: current_user.id,
            name: fields.name,
            website: fields.website,
            description: fields.description,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(RoasterResponse::from(roaster))))
}

/// Fetch a roaster
#[utoipa::path(
    get,
    path = "/api/roaster/{id}",
    tag = "roasters",
    params(("id" = i64, Path, description = "Roaster ID")),
    responses(
        (status = 200, description = "Roaster", body = RoasterResponse),
        (status = 401, description = "Not signed in"),
        (status = 404, description = "Roaster not found"),
    )
)]
#[tracing::instrument(skip_all, fields(roaster_id = id))]
pub async fn get_roaster(State(state): State<AppState>, Path(id): Path<RoasterId>) -> Result<Json<RoasterResponse>, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let roaster = Roasters::new(&mut conn).get_by_id(id).await?.ok_or_else(|| not_found(id))?;

    Ok(Json(RoasterResponse::from(roaster)))
}

/// Replace a roaster's details
#[utoipa::path(
    put,
    path = "/api/roaster/{id}",
    request_body = RoasterRequest,
    tag = "roasters",
    params(("id" = i64, Path, description = "Roaster ID")),
    responses(
        (status = 200, description = "Updated roaster", body = RoasterResponse),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Neither the owner nor an admin"),
    )
)]
#[tracing::instrument(skip_all, fields(roaster_id = id))]
pub async fn update_roaster(
    State(state): State<AppState>,
    Path(id): Path<RoasterId>,
    Json(request): Json<RoasterRequest>,
) -> Result<Json<RoasterResponse>, Error> {
    let fields = normalize(request)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let roaster = Roasters::new(&mut conn).update(id, &fields).await?;

    Ok(Json(RoasterResponse::from(roaster)))
}

/// Delete a roaster
#[utoipa::path(
    delete,
    path = "/api/roaster/{id}",
    tag = "roasters",
    params(("id" = i64, Path, description = "Roaster ID")),
    responses(
        (status = 204, description = "Roaster deleted"),
        (status = 403, description = "Neither the owner nor an admin"),
    )
)]
#[tracing::instrument(skip_all, fields(roaster_id = id))]
pub async fn delete_roaster(State(state): State<AppState>, Path(id): Path<RoasterId>) -> Result<StatusCode, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if !Roasters::new(&mut conn).delete(id).await? {
        return Err(not_found(id));
    }

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use crate::{
        api::models::roasters::RoasterResponse,
        test_utils::{create_test_app, create_test_config, create_test_user, session_cookie_for},
        types::Level,
    };
    use axum::http::StatusCode;
    use serde_json::json;

    #[test_log::test(tokio::test)]
    async fn test_roaster_ownership() {
        let (server, state) = create_test_app(create_test_config()).await;
        let admin = create_test_user(&state.db, "root", "pw", Level::ADMIN | Level::MEMBER).await;
        let alice = create_test_user(&state.db, "alice", "p1", Level::MEMBER).await;
        let bob = create_test_user(&state.db, "bob", "p2", Level::MEMBER).await;
        let alice_cookie = session_cookie_for(&state, &alice);
        let bob_cookie = session_cookie_for(&state, &bob);

        let response = server
            .post("/api/roaster")
            .add_header("cookie", alice_cookie.clone())
            .json(&json!({ "name": "  Square Mile ", "website": "", "description": "London" }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let roaster: RoasterResponse = response.json();
        assert_eq!(roaster.owner_id, alice.id);
        assert_eq!(roaster.name, "Square Mile");
        assert_eq!(roaster.website, None);

        let path = format!("/api/roaster/{}", roaster.id);
        let update = json!({ "name": "Square Mile Coffee" });

        // Any signed-in user may read
        server.get(&path).add_header("cookie", bob_cookie.clone()).await.assert_status_ok();

        // Only the owner or an admin may write
        server
            .put(&path)
            .add_header("cookie", bob_cookie.clone())
            .json(&update)
            .await
            .assert_status(StatusCode::FORBIDDEN);
        server
            .delete(&path)
            .add_header("cookie", bob_cookie)
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let updated: RoasterResponse = server
            .put(&path)
            .add_header("cookie", alice_cookie.clone())
            .json(&update)
            .await
            .json();
        assert_eq!(updated.name, "Square Mile Coffee");
        assert_eq!(updated.description, None);

        server
            .delete(&path)
            .add_header("cookie", session_cookie_for(&state, &admin))
            .await
            .assert_status(StatusCode::NO_CONTENT);

        // Gone: the ownership lookup finds nothing, so non-admins are denied
        server
            .put(&path)
            .add_header("cookie", alice_cookie)
            .json(&update)
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }

    #[test_log::test(tokio::test)]
    async fn test_list_roasters_scoped_to_member() {
        let (server, state) = create_test_app(create_test_config()).await;
        let admin = create_test_user(&state.db, "root", "pw", Level::ADMIN | Level::MEMBER).await;
        let alice = create_test_user(&state.db, "alice", "p1", Level::MEMBER).await;
        let bob = create_test_user(&state.db, "bob", "p2", Level::MEMBER).await;

        for (user, name) in [(&alice, "Onyx"), (&alice, "Assembly"), (&bob, "Tim Wendelboe")] {
            server
                .post("/api/roaster")
                .add_header("cookie", session_cookie_for(&state, user))
                .json(&json!({ "name": name }))
                .await
                .assert_status(StatusCode::CREATED);
        }

        let mine: Vec<RoasterResponse> = server
            .get("/api/roasters")
            .add_header("cookie", session_cookie_for(&state, &alice))
            .add_query_param("owner_id", bob.id)
            .await
            .json();
        let names: Vec<_> = mine.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Assembly", "Onyx"]);

        let all: Vec<RoasterResponse> = server
            .get("/api/roasters")
            .add_header("cookie", session_cookie_for(&state, &admin))
            .await
            .json();
        assert_eq!(all.len(), 3);

        let bobs: Vec<RoasterResponse> = server
            .get("/api/roasters")
            .add_header("cookie", session_cookie_for(&state, &admin))
            .add_query_param("owner_id", bob.id)
            .await
            .json();
        assert_eq!(bobs.len(), 1);

        server.get("/api/roasters").await.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[test_log::test(tokio::test)]
    async fn test_blank_roaster_name_rejected() {
        let (server, state) = create_test_app(create_test_config()).await;
        let alice = create_test_user(&state.db, "alice", "p1", Level::MEMBER).await;

        server
            .post("/api/roaster")
            .add_header("cookie", session_cookie_for(&state, &alice))
            .json(&json!({ "name": " " }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }
}
