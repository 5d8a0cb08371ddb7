/// Protocol tests against a local mock Jenkins.
#[cfg(test)]
mod protocol {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use mockito::Matcher;

    use crate::{
        parse_executable_url, parse_queue_location, BuildAction, BuildNumber, BuildRequest,
        BuildStatus, CiJob, Credentials, JenkinsClient, JenkinsError, PollSettings, QueueItem,
    };

    // "user:pass"
    const BASIC_AUTH: &str = "Basic dXNlcjpwYXNz";

    fn client(attempts: u32, interval_ms: u64) -> JenkinsClient {
        JenkinsClient::new(
            Credentials {
                username: "user".into(),
                password: "pass".into(),
            },
            PollSettings {
                queue_attempts: attempts,
                queue_interval: Duration::from_millis(interval_ms),
            },
        )
        .unwrap()
    }

    fn build(n: &str) -> BuildNumber {
        BuildNumber::parse(n).unwrap()
    }

    #[test]
    fn parses_queue_location() {
        assert_eq!(
            parse_queue_location("http://10.0.0.1:8080/queue/item/118/"),
            Some(QueueItem(118))
        );
        assert_eq!(parse_queue_location("http://10.0.0.1:8080/queue/item/x/"), None);
        assert_eq!(parse_queue_location(""), None);
    }

    #[test]
    fn parses_executable_url() {
        assert_eq!(
            parse_executable_url("http://ci:8080/job/deploy/42/"),
            Some(build("42"))
        );
        assert_eq!(parse_executable_url("http://ci:8080/job/deploy/42"), None);
    }

    #[tokio::test]
    async fn trigger_sends_encoded_params_and_reads_queue_item() {
        let mut server = mockito::Server::new_async().await;
        let location = format!("{}/queue/item/118/", server.url());
        let mock = server
            .mock("POST", Matcher::Regex(r"^/job/deploy/buildWithParameters".into()))
            .match_header("authorization", BASIC_AUTH)
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("appName".into(), "my app".into()),
                Matcher::UrlEncoded("envVariables".into(), r#"{"KEY":"v"}"#.into()),
                Matcher::UrlEncoded("ACTION".into(), "Apply".into()),
            ]))
            .with_status(201)
            .with_header("location", &location)
            .expect(1)
            .create_async()
            .await;

        let job = CiJob::new(server.url(), "deploy");
        let request = BuildRequest::new(BuildAction::Apply)
            .param("appName", "my app")
            .param("envVariables", serde_json::json!({"KEY": "v"}));
        let item = client(5, 10).trigger(&job, &request).await.unwrap();

        assert_eq!(item, Some(QueueItem(118)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn trigger_without_location_yields_no_queue_item() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", Matcher::Regex(r"^/job/deploy/buildWithParameters".into()))
            .with_status(201)
            .create_async()
            .await;

        let job = CiJob::new(server.url(), "deploy");
        let item = client(5, 10)
            .trigger(&job, &BuildRequest::new(BuildAction::Destroy))
            .await
            .unwrap();
        assert_eq!(item, None);
    }

    #[tokio::test]
    async fn trigger_rejected_by_jenkins_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", Matcher::Regex(r"^/job/deploy/buildWithParameters".into()))
            .with_status(403)
            .create_async()
            .await;

        let job = CiJob::new(server.url(), "deploy");
        let err = client(5, 10)
            .trigger(&job, &BuildRequest::new(BuildAction::Apply))
            .await
            .unwrap_err();
        assert!(matches!(err, JenkinsError::Status { status: 403, .. }));
    }

    #[tokio::test]
    async fn queue_resolution_gives_up_after_bounded_attempts() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/queue/item/7/api/json")
            .match_header("authorization", BASIC_AUTH)
            .with_status(200)
            .with_body(r#"{"why":"Waiting for next available executor"}"#)
            .expect(5)
            .create_async()
            .await;

        let started = Instant::now();
        let number = client(5, 50)
            .resolve_queue_item(&server.url(), Some(&QueueItem(7)))
            .await;
        let elapsed = started.elapsed();

        assert_eq!(number, None);
        assert!(
            elapsed >= Duration::from_millis(200),
            "expected four inter-attempt delays, got {elapsed:?}"
        );
        assert!(
            elapsed < Duration::from_millis(250 + 1000),
            "no delay should follow the final attempt, got {elapsed:?}"
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn queue_resolution_short_circuits_once_scheduled() {
        let mut server = mockito::Server::new_async().await;
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let exec_url = format!("{}/job/deploy/42/", server.url());
        let mock = server
            .mock("GET", "/queue/item/9/api/json")
            .with_status(200)
            .with_body_from_request(move |_| {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    br#"{"executable":null}"#.to_vec()
                } else {
                    serde_json::json!({"executable": {"number": 42, "url": exec_url}})
                        .to_string()
                        .into_bytes()
                }
            })
            .expect(2)
            .create_async()
            .await;

        let number = client(5, 10)
            .resolve_queue_item(&server.url(), Some(&QueueItem(9)))
            .await;

        assert_eq!(number, Some(build("42")));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn queue_resolution_retries_after_errors() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/queue/item/3/api/json")
            .with_status(500)
            .expect(3)
            .create_async()
            .await;

        let number = client(3, 5)
            .resolve_queue_item(&server.url(), Some(&QueueItem(3)))
            .await;
        assert_eq!(number, None);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn queue_resolution_without_item_fails_immediately() {
        let started = Instant::now();
        let number = client(5, 5000)
            .resolve_queue_item("http://127.0.0.1:1", None)
            .await;
        assert_eq!(number, None);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn build_status_reads_result_field() {
        let mut server = mockito::Server::new_async().await;
        let _ok = server
            .mock("GET", "/job/deploy/5/api/json")
            .with_body(r#"{"result":"SUCCESS","building":false}"#)
            .create_async()
            .await;
        let _running = server
            .mock("GET", "/job/deploy/6/api/json")
            .with_body(r#"{"result":null,"building":true}"#)
            .create_async()
            .await;
        let _aborted = server
            .mock("GET", "/job/deploy/7/api/json")
            .with_body(r#"{"result":"ABORTED"}"#)
            .create_async()
            .await;

        let job = CiJob::new(server.url(), "deploy");
        let c = client(5, 10);
        assert_eq!(c.build_status(&job, &build("5")).await.unwrap(), BuildStatus::Success);
        assert_eq!(c.build_status(&job, &build("6")).await.unwrap(), BuildStatus::Pending);
        assert_eq!(c.build_status(&job, &build("7")).await.unwrap(), BuildStatus::Aborted);
    }

    #[tokio::test]
    async fn console_slice_requests_range_from_cursor() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/job/deploy/5/consoleText")
            .match_header("range", "bytes=12-")
            .with_status(206)
            .with_body("next chunk")
            .expect(1)
            .create_async()
            .await;

        let job = CiJob::new(server.url(), "deploy");
        let slice = client(5, 10)
            .console_slice(&job, &build("5"), 12)
            .await
            .unwrap();
        assert_eq!(&slice.data[..], b"next chunk");
        assert_eq!(slice.next_offset(), 22);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn console_slice_trims_when_range_is_ignored() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/job/deploy/5/consoleText")
            .with_status(200)
            .with_body("0123456789")
            .create_async()
            .await;

        let job = CiJob::new(server.url(), "deploy");
        let c = client(5, 10);
        let slice = c.console_slice(&job, &build("5"), 4).await.unwrap();
        assert_eq!(&slice.data[..], b"456789");
        let past_end = c.console_slice(&job, &build("5"), 10).await.unwrap();
        assert!(past_end.is_empty());
    }

    #[tokio::test]
    async fn console_slice_unsatisfiable_range_is_empty() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/job/deploy/5/consoleText")
            .with_status(416)
            .create_async()
            .await;

        let job = CiJob::new(server.url(), "deploy");
        let slice = client(5, 10)
            .console_slice(&job, &build("5"), 99)
            .await
            .unwrap();
        assert!(slice.is_empty());
        assert_eq!(slice.next_offset(), 99);
    }

    #[tokio::test]
    async fn probe_fails_only_on_transport_errors() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/json")
            .with_status(403)
            .create_async()
            .await;

        let c = client(5, 10);
        assert!(c.probe(&server.url()).await.is_ok());
        assert!(c.probe("http://127.0.0.1:1").await.is_err());
        assert!(matches!(
            c.probe("not a url").await,
            Err(JenkinsError::InvalidUrl { .. })
        ));
    }
}
