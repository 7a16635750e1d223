//! Listing pagination against a scripted server

mod common;

use common::*;
use redpage::{FetchOptions, Listing, Thing};
use serde_json::json;
use std::collections::BTreeMap;

/// Serves `pages` keyed by the `after` cursor of the request (`None` for the first page)
fn paged_server(pages: Vec<(Option<&'static str>, serde_json::Value)>) -> std::sync::Arc<MockTransport> {
    MockTransport::new(move |request| {
        let after = query(request, "after");
        pages
            .iter()
            .find(|(cursor, _)| cursor.map(str::to_string) == after)
            .map(|(_, body)| ok(body.clone()))
            .unwrap_or_else(|| status(404))
    })
}

fn alphabet_server() -> std::sync::Arc<MockTransport> {
    paged_server(vec![
        (None, listing(vec![post("a"), post("b")], Some("t3_b"), None)),
        (Some("t3_b"), listing(vec![post("c"), post("d")], Some("t3_d"), None)),
        (Some("t3_d"), listing(vec![post("e")], None, None)),
    ])
}

#[tokio::test(start_paused = true)]
async fn fetch_more_follows_the_after_cursor() {
    let transport = paged_server(vec![
        (None, listing(vec![post("a"), post("b"), post("c")], Some("t3_c"), None)),
        (Some("t3_c"), listing(vec![post("d"), post("e")], None, None)),
    ]);
    let client = client(static_config(), &transport);

    let first = client.get_new(Some("rust")).await.unwrap();
    assert_eq!(first.len(), 3);
    assert!(!first.is_finished());

    let grown = first.fetch_more(&client, FetchOptions::new(5)).await.unwrap();

    assert_eq!(names(&grown), vec!["t3_a", "t3_b", "t3_c", "t3_d", "t3_e"]);
    assert!(grown.is_finished());
    assert_eq!(transport.api_calls(), 2);

    let second = &transport.api_requests()[1];
    assert_eq!(second.url.path(), "/r/rust/new");
    assert_eq!(query(second, "after").as_deref(), Some("t3_c"));
    assert_eq!(query(second, "limit").as_deref(), Some("5"));
    assert_eq!(query(second, "count").as_deref(), Some("9999"));
}

#[tokio::test(start_paused = true)]
async fn paging_in_steps_matches_fetch_all() {
    let transport = alphabet_server();
    let client = client(static_config(), &transport);
    let first = client.get_new(None).await.unwrap();

    let everything = first.fetch_all(&client).await.unwrap();

    let mut stepped = first.clone();
    while !stepped.is_finished() {
        stepped = stepped.fetch_more(&client, FetchOptions::new(1)).await.unwrap();
    }

    assert_eq!(names(&everything), vec!["t3_a", "t3_b", "t3_c", "t3_d", "t3_e"]);
    assert_eq!(names(&stepped), names(&everything));
}

#[tokio::test(start_paused = true)]
async fn fetch_more_leaves_the_receiver_untouched() {
    let transport = alphabet_server();
    let client = client(static_config(), &transport);
    let first = client.get_new(None).await.unwrap();
    let snapshot = first.clone();

    let grown = first.fetch_more(&client, FetchOptions::new(2)).await.unwrap();

    assert_eq!(first, snapshot);
    assert_eq!(first.len(), 2);
    assert_eq!(grown.len(), 4);
}

#[tokio::test(start_paused = true)]
async fn over_delivered_items_are_served_from_the_buffer() {
    let transport = paged_server(vec![
        (None, listing(vec![post("a")], Some("t3_a"), None)),
        (
            Some("t3_a"),
            listing(vec![post("b"), post("c"), post("d")], None, None),
        ),
    ]);
    let client = client(static_config(), &transport);
    let first = client.get_new(None).await.unwrap();

    let one_more = first.fetch_more(&client, FetchOptions::new(1)).await.unwrap();
    assert_eq!(names(&one_more), vec!["t3_a", "t3_b"]);
    assert_eq!(one_more.buffered(), 2);
    assert!(!one_more.is_finished());
    assert_eq!(transport.api_calls(), 2);

    let rest = one_more.fetch_more(&client, FetchOptions::new(10)).await.unwrap();
    assert_eq!(names(&rest), vec!["t3_a", "t3_b", "t3_c", "t3_d"]);
    assert_eq!(rest.buffered(), 0);
    assert!(rest.is_finished());
    assert_eq!(transport.api_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn limit_is_clamped_to_one_hundred() {
    let transport = paged_server(vec![
        (None, listing(vec![post("a")], Some("t3_a"), None)),
        (Some("t3_a"), listing(vec![post("b")], None, None)),
    ]);
    let client = client(static_config(), &transport);
    let first = client.get_new(None).await.unwrap();

    first.fetch_more(&client, FetchOptions::new(250)).await.unwrap();

    let request = &transport.api_requests()[1];
    assert_eq!(query(request, "limit").as_deref(), Some("100"));
}

#[tokio::test(start_paused = true)]
async fn exhausted_listing_makes_no_requests() {
    let transport = paged_server(vec![(None, listing(vec![post("a")], None, None))]);
    let client = client(static_config(), &transport);
    let first = client.get_new(None).await.unwrap();
    assert!(first.is_finished());

    let again = first.fetch_more(&client, FetchOptions::new(10)).await.unwrap();
    let all = again.fetch_all(&client).await.unwrap();

    assert_eq!(names(&all), vec!["t3_a"]);
    assert_eq!(transport.api_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn replacing_fetch_keeps_only_new_items() {
    let transport = alphabet_server();
    let client = client(static_config(), &transport);
    let first = client.get_new(None).await.unwrap();

    let next = first
        .fetch_more(&client, FetchOptions::new(2).append(false))
        .await
        .unwrap();

    assert_eq!(names(&next), vec!["t3_c", "t3_d"]);
    assert_eq!(next.after(), Some("t3_d"));
}

#[tokio::test(start_paused = true)]
async fn empty_page_ends_pagination() {
    let transport = paged_server(vec![
        (None, listing(vec![post("a")], Some("t3_a"), None)),
        (Some("t3_a"), listing(vec![], Some("t3_zzz"), None)),
    ]);
    let client = client(static_config(), &transport);
    let first = client.get_new(None).await.unwrap();

    let grown = first.fetch_more(&client, FetchOptions::new(10)).await.unwrap();

    assert_eq!(names(&grown), vec!["t3_a"]);
    assert!(grown.is_finished());
    assert_eq!(grown.after(), None);
    assert_eq!(grown.before(), None);
    assert_eq!(transport.api_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn before_cursor_pages_backwards() {
    let transport = MockTransport::new(|request| match query(request, "before").as_deref() {
        Some("t3_x") => ok(listing(
            vec![post("p"), post("q"), post("r")],
            None,
            Some("t3_p"),
        )),
        _ => status(404),
    });
    let client = client(static_config(), &transport);
    let mut source = BTreeMap::new();
    source.insert("before".to_string(), "t3_x".to_string());
    source.insert("t".to_string(), "day".to_string());
    let placeholder: Listing<Thing> = Listing::placeholder("r/rust/top", source);
    assert!(!placeholder.is_finished());
    assert!(placeholder.query().get("before").is_none());

    let two = placeholder.fetch_more(&client, FetchOptions::new(2)).await.unwrap();
    assert_eq!(names(&two), vec!["t3_q", "t3_r"]);
    assert_eq!(two.before(), Some("t3_p"));
    assert_eq!(two.buffered(), 1);

    let three = two.fetch_more(&client, FetchOptions::new(1)).await.unwrap();
    assert_eq!(names(&three), vec!["t3_p", "t3_q", "t3_r"]);

    assert_eq!(transport.api_calls(), 1);
    let request = &transport.api_requests()[0];
    assert_eq!(query(request, "t").as_deref(), Some("day"));
    assert_eq!(query(request, "after"), None);
}

#[tokio::test(start_paused = true)]
async fn placeholder_fetches_its_first_page() {
    let transport = alphabet_server();
    let client = client(static_config(), &transport);
    let placeholder: Listing<Thing> = Listing::placeholder("new", BTreeMap::new());
    assert!(placeholder.is_empty());
    assert!(!placeholder.is_finished());

    let first = placeholder.fetch_more(&client, FetchOptions::new(2)).await.unwrap();
    assert_eq!(names(&first), vec!["t3_a", "t3_b"]);
    assert_eq!(query(&transport.api_requests()[0], "after"), None);
}

#[tokio::test(start_paused = true)]
async fn duplicates_page_through_the_second_array_element() {
    let transport = paged_server(vec![
        (
            None,
            json!([
                listing(vec![post("abc")], None, None),
                listing(vec![post("x"), post("y")], Some("t3_y"), None)
            ]),
        ),
        (
            Some("t3_y"),
            json!([
                listing(vec![post("abc")], None, None),
                listing(vec![post("z")], None, None)
            ]),
        ),
    ]);
    let client = client(static_config(), &transport);

    let first = client.get_duplicates("abc").await.unwrap();
    assert_eq!(names(&first), vec!["t3_x", "t3_y"]);

    let all = first.fetch_all(&client).await.unwrap();
    assert_eq!(names(&all), vec!["t3_x", "t3_y", "t3_z"]);
    assert!(all.is_finished());
    assert_eq!(transport.api_requests()[1].url.path(), "/duplicates/abc");
}

#[tokio::test(start_paused = true)]
async fn typed_listing_drops_other_kinds() {
    let transport = paged_server(vec![(
        None,
        listing(vec![post("a"), comment("c", "t3_a"), post("b")], None, None),
    )]);
    let client = client(static_config(), &transport);

    let posts = client.get_new(None).await.unwrap();
    assert_eq!(names(&posts), vec!["t3_a", "t3_b"]);
    assert_eq!(posts[1].title(), "post b");
}

#[tokio::test(start_paused = true)]
async fn page_of_other_kinds_does_not_end_a_typed_listing() {
    let transport = paged_server(vec![
        (None, listing(vec![post("a")], Some("t3_a"), None)),
        (
            Some("t3_a"),
            listing(vec![comment("x", "t3_a"), comment("y", "t3_a")], Some("t1_y"), None),
        ),
        (Some("t1_y"), listing(vec![post("b")], None, None)),
    ]);
    let client = client(static_config(), &transport);
    let first = client.get_new(None).await.unwrap();

    let all = first.fetch_all(&client).await.unwrap();

    assert_eq!(names(&all), vec!["t3_a", "t3_b"]);
    assert!(all.is_finished());
    assert_eq!(transport.api_calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn fetch_more_counts_only_kept_items() {
    let transport = paged_server(vec![
        (None, listing(vec![post("a")], Some("t3_a"), None)),
        (Some("t3_a"), listing(vec![comment("x", "t3_a")], Some("t1_x"), None)),
        (Some("t1_x"), listing(vec![post("b"), post("c")], None, None)),
    ]);
    let client = client(static_config(), &transport);
    let first = client.get_new(None).await.unwrap();

    let grown = first.fetch_more(&client, FetchOptions::new(1)).await.unwrap();

    assert_eq!(names(&grown), vec!["t3_a", "t3_b"]);
    assert_eq!(grown.buffered(), 1);
    assert_eq!(transport.api_calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn inbox_keeps_comment_replies_beside_messages() {
    let transport = paged_server(vec![
        (None, listing(vec![message("a")], Some("t4_a"), None)),
        (
            Some("t4_a"),
            listing(vec![comment("x", "t3_post"), comment("y", "t3_post")], Some("t1_y"), None),
        ),
        (Some("t1_y"), listing(vec![message("b")], None, None)),
    ]);
    let client = client(static_config(), &transport);

    let inbox = client.get_inbox().await.unwrap().fetch_all(&client).await.unwrap();

    assert_eq!(names(&inbox), vec!["t4_a", "t1_x", "t1_y", "t4_b"]);
    assert!(matches!(inbox[0], Thing::Message(_)));
    assert!(matches!(inbox[1], Thing::Comment(_)));
    assert!(inbox.is_finished());
    assert_eq!(transport.api_calls(), 3);
    assert_eq!(transport.api_requests()[0].url.path(), "/message/inbox");
}
