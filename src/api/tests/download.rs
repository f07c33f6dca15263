use super::*;

#[tokio::test]
async fn single_url_is_accepted_with_notification_by_default() {
    let app = test_app().await;

    let response = app
        .request(json_request(
            "POST",
            "/download",
            r#"{"videoURL":"https://example/watch?v=abc123"}"#,
        ))
        .await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(body_json(response).await["accepted"], 1);

    let jobs = app.backend.jobs.lock().unwrap().clone();
    assert_eq!(
        jobs,
        vec![IngestJob::new("https://example/watch?v=abc123", true)]
    );
}

#[tokio::test]
async fn url_list_queues_one_job_each() {
    let app = test_app().await;

    let response = app
        .request(json_request(
            "POST",
            "/download",
            r#"{"videoURLs":["https://example/watch?v=a","https://example/watch?v=b"],"sendNotification":false}"#,
        ))
        .await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let jobs = app.backend.jobs.lock().unwrap().clone();
    assert_eq!(jobs.len(), 2);
    assert!(jobs.iter().all(|job| !job.send_notification));
    assert_eq!(jobs[1].url, "https://example/watch?v=b");
}

#[tokio::test]
async fn in_process_backend_answers_200() {
    use crate::pipeline::JobRunner;
    use crate::queue::WorkerPool;

    struct Idle;

    #[async_trait]
    impl JobRunner for Idle {
        async fn run(
            &self,
            job: &IngestJob,
        ) -> std::result::Result<EpisodeRecord, crate::error::IngestError> {
            Ok(episode(&job.url, 0, false))
        }
    }

    let dir = TempDir::new().unwrap();
    let db = Arc::new(Database::new(&dir.path().join("api.db")).await.unwrap());
    let pool = Arc::new(WorkerPool::new(Arc::new(Idle), 1));
    let state = AppState::new(db, pool.clone(), Arc::new(RecordingStore::default()), PUBLIC_URL);
    let router = create_router(state, API_KEY);

    let response = router
        .oneshot(json_request(
            "POST",
            "/download",
            r#"{"videoURL":"https://example/watch?v=abc123"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(pool.shutdown(Duration::from_secs(5)).await);
}

#[tokio::test]
async fn malformed_bodies_are_400_and_queue_nothing() {
    let app = test_app().await;

    for body in [
        "not json",
        "{}",
        r#"{"videoURLs":[]}"#,
        r#"{"videoURL":42}"#,
        r#"{"videoURL":"https://example/watch?v=a","sendNotification":"yes"}"#,
        r#"{"videoURLs":["https://example/watch?v=a","not a url"]}"#,
    ] {
        let response = app.request(json_request("POST", "/download", body)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {body}");
    }

    assert!(app.backend.jobs.lock().unwrap().is_empty());
}

#[tokio::test]
async fn submissions_after_shutdown_are_503() {
    let app = test_app().await;
    app.backend.shutdown(Duration::from_secs(1)).await;

    let response = app
        .request(json_request(
            "POST",
            "/download",
            r#"{"videoURL":"https://example/watch?v=abc123"}"#,
        ))
        .await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(response).await["error"]["code"], "shutting_down");
}

#[tokio::test]
async fn partial_acceptance_reports_how_many_were_queued() {
    let app = test_app().await;
    app.backend.capacity.store(1, Ordering::SeqCst);

    let response = app
        .request(json_request(
            "POST",
            "/download",
            r#"{"videoURLs":["https://example/watch?v=one","https://example/watch?v=two","https://example/watch?v=three"]}"#,
        ))
        .await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = body_json(response).await;
    assert_eq!(json["accepted"], 1);
    assert_eq!(json["rejected"], 2);
    let jobs = app.backend.jobs.lock().unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].url, "https://example/watch?v=one");
}

#[tokio::test]
async fn full_acceptance_omits_rejected_count() {
    let app = test_app().await;

    let response = app
        .request(json_request(
            "POST",
            "/download",
            r#"{"videoURLs":["https://example/watch?v=one","https://example/watch?v=two"]}"#,
        ))
        .await;

    let json = body_json(response).await;
    assert_eq!(json["accepted"], 2);
    assert!(json.get("rejected").is_none());
}
