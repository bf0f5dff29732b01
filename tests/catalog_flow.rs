mod common;

use common::{movie, show, FakeTmdb};
use labtv::catalog::Catalog;
use labtv::models::ContentKind;
use std::sync::Arc;

#[tokio::test]
async fn featured_keeps_order_and_forces_entry_kind() {
    let tmdb = FakeTmdb::default();
    {
        let mut by_query = tmdb.search_by_query.lock().unwrap();
        // Untagged hit without an air date reads as a movie.
        by_query.insert("Chernobyl".into(), vec![movie(87108, &[18])]);
        by_query.insert("Inception".into(), vec![movie(27205, &[28]), movie(1, &[])]);
        by_query.insert("Dark".into(), vec![show(70523, &[18, 9648])]);
    }
    tmdb.failing_queries
        .lock()
        .unwrap()
        .insert("Broken".into());
    let tmdb = Arc::new(tmdb);
    let catalog = Catalog::new(tmdb.clone());

    let entries = [
        ("Dark", ContentKind::Tv),
        ("Nowhere To Be Found", ContentKind::Movie),
        ("Chernobyl", ContentKind::Tv),
        ("Broken", ContentKind::Movie),
        ("Inception", ContentKind::Movie),
    ];
    let featured = catalog.featured(&entries).await;

    let resolved: Vec<(u32, ContentKind)> = featured.iter().map(|t| (t.id, t.kind)).collect();
    assert_eq!(
        resolved,
        vec![
            (70523, ContentKind::Tv),
            (87108, ContentKind::Tv),
            (27205, ContentKind::Movie),
        ]
    );
    let calls = tmdb.calls();
    assert!(calls.contains(&"search tv Chernobyl 1".to_string()));
    assert!(calls.contains(&"search movie Broken 1".to_string()));
}

#[tokio::test]
async fn featured_with_no_hits_is_empty() {
    let catalog = Catalog::new(Arc::new(FakeTmdb::default()));
    let featured = catalog
        .featured(&[("Lost", ContentKind::Tv), ("Heat", ContentKind::Movie)])
        .await;
    assert!(featured.is_empty());
}
