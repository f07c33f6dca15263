use super::*;

async fn seed(app: &TestApp) {
    app.db.insert_episode(&episode("old", 1_000, true)).await.unwrap();
    app.db.insert_episode(&episode("mid", 2_000, false)).await.unwrap();
    app.db.insert_episode(&episode("new", 3_000, true)).await.unwrap();
}

fn ids(json: &serde_json::Value) -> Vec<String> {
    json.as_array()
        .unwrap()
        .iter()
        .map(|e| e["id"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn lists_all_episodes_newest_first() {
    let app = test_app().await;
    seed(&app).await;

    let response = app
        .request(authed("GET", "/episodes").body(Body::empty()).unwrap())
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(ids(&json), vec!["new", "mid", "old"]);
    assert_eq!(json[0]["pub_date_ms"], 3_000);
    assert_eq!(json[0]["thumbnail"], format!("{PUBLIC_URL}/new.jpg"));
    assert!(json[1]["thumbnail"].is_null());
}

#[tokio::test]
async fn from_date_is_exclusive() {
    let app = test_app().await;
    seed(&app).await;

    let response = app
        .request(
            authed("GET", "/episodes?from_date=2000")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(ids(&body_json(response).await), vec!["new"]);
}

#[tokio::test]
async fn empty_filtered_result_is_204() {
    let app = test_app().await;
    seed(&app).await;

    let response = app
        .request(
            authed("GET", "/episodes?from_date=3000")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn empty_catalog_without_filter_is_an_empty_list() {
    let app = test_app().await;

    let response = app
        .request(authed("GET", "/episodes").body(Body::empty()).unwrap())
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, serde_json::json!([]));
}

#[tokio::test]
async fn invalid_from_date_is_400() {
    let app = test_app().await;

    for uri in ["/episodes?from_date=-1", "/episodes?from_date=yesterday"] {
        let response = app
            .request(authed("GET", uri).body(Body::empty()).unwrap())
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
    }
}

#[tokio::test]
async fn delete_removes_record_then_objects() {
    let app = test_app().await;
    seed(&app).await;

    let response = app
        .request(authed("DELETE", "/episodes/new").body(Body::empty()).unwrap())
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["id"], "new");
    assert!(app.db.get_episode("new").await.unwrap().is_none());
    assert_eq!(
        *app.store.deletes.lock().unwrap(),
        vec!["new.mp3", "new.jpg"]
    );
}

#[tokio::test]
async fn delete_without_artwork_only_touches_audio() {
    let app = test_app().await;
    seed(&app).await;

    app.request(authed("DELETE", "/episodes/mid").body(Body::empty()).unwrap())
        .await;

    assert_eq!(*app.store.deletes.lock().unwrap(), vec!["mid.mp3"]);
}

#[tokio::test]
async fn storage_failures_do_not_fail_delete() {
    let app = test_app_with_store(RecordingStore {
        fail_deletes: true,
        ..Default::default()
    })
    .await;
    seed(&app).await;

    let response = app
        .request(authed("DELETE", "/episodes/old").body(Body::empty()).unwrap())
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(app.db.get_episode("old").await.unwrap().is_none());
    assert_eq!(app.store.deletes.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn deleting_unknown_episode_is_404() {
    let app = test_app().await;

    let response = app
        .request(authed("DELETE", "/episodes/missing").body(Body::empty()).unwrap())
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(app.store.deletes.lock().unwrap().is_empty());
}
