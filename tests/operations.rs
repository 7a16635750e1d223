//! CLI workflows on top of a scripted client

mod common;

use common::*;
use redpage::operations::modlog::{ModlogOperation, ModlogOptions};
use redpage::operations::posts::{PostsOperation, PostsOptions};
use redpage::operations::thread::{ThreadOperation, ThreadOptions};
use serde_json::json;

#[tokio::test(start_paused = true)]
async fn posts_operation_pages_until_count() {
    let transport = MockTransport::new(|request| match query(request, "after").as_deref() {
        None => ok(listing(vec![post("a"), post("b")], Some("t3_b"), None)),
        Some("t3_b") => ok(listing(vec![post("c"), post("d")], Some("t3_d"), None)),
        _ => status(404),
    });
    let client = client(static_config(), &transport);

    let result = PostsOperation::with_client(
        PostsOptions {
            count: 3,
            subreddit: Some("rust".to_string()),
            brief: true,
        },
        client,
    )
    .execute()
    .await
    .unwrap();

    assert_eq!(result.post_count, 3);
    assert!(result.formatted_output.starts_with("Found 3 posts\n"));
    assert!(result.formatted_output.contains("post c r/rust | ID: t3_c"));
    assert!(!result.formatted_output.contains("t3_d"));
    assert_eq!(query(&transport.api_requests()[1], "limit").as_deref(), Some("1"));
}

#[tokio::test(start_paused = true)]
async fn thread_operation_expands_the_comment_tree() {
    let transport = MockTransport::new(|request| match request.url.path() {
        "/comments/post" => ok(comments_page(
            "post",
            vec![
                comment("a", "t3_post"),
                more("t1_stub", "t3_post", &["b", "c"]),
            ],
        )),
        "/api/info" => ok(listing(
            vec![comment("b", "t3_post"), comment("c", "t3_post")],
            None,
            None,
        )),
        _ => status(404),
    });
    let client = client(static_config(), &transport);

    let result = ThreadOperation::with_client(
        ThreadOptions {
            submission_id: "t3_post".to_string(),
            limit: None,
            flat: true,
        },
        client,
    )
    .execute()
    .await
    .unwrap();

    assert_eq!(result.comment_count, 3);
    assert!(result.formatted_output.starts_with("post post\n"));
    assert!(result.formatted_output.contains("- u/commenter (1): comment c\n"));
    assert!(result.submission.comments.unwrap().is_finished());
}

#[tokio::test(start_paused = true)]
async fn modlog_operation_renders_actions() {
    let transport = MockTransport::new(|_| {
        ok(listing(
            vec![json!({"kind": "modaction", "data": {
                "id": "ModAction_1",
                "action": "removecomment",
                "mod": "automod",
                "target_author": "spammer",
                "created_utc": 1_704_067_200.0
            }})],
            None,
            None,
        ))
    });
    let client = client(
        redpage::AppConfig {
            display_timezone: "UTC".to_string(),
            ..static_config()
        },
        &transport,
    );

    let result = ModlogOperation::with_client(
        ModlogOptions {
            subreddit: "r/rust".to_string(),
            count: 10,
        },
        client,
    )
    .execute()
    .await
    .unwrap();

    assert_eq!(result.actions.len(), 1);
    assert_eq!(
        result.formatted_output,
        "[2024-01-01 00:00] automod removecomment u/spammer\n"
    );
    assert_eq!(transport.api_requests()[0].url.path(), "/r/rust/about/log");
}
