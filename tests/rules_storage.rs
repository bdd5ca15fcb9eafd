//! Integration tests for rule persistence across database handles.

use sitefeed::rules::{apply_rules, SourceRules};
use sitefeed::storage::Database;
use std::path::PathBuf;

fn temp_db_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("sitefeed-{name}-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("rules.db");
    let _ = std::fs::remove_file(&path);
    path
}

#[tokio::test]
async fn test_rules_survive_reopen() {
    let path = temp_db_path("reopen");
    let path_str = path.to_str().unwrap();
    let rules = SourceRules {
        title_excludes: vec!["sponsored".into()],
        skip_top_count: 1,
        ..Default::default()
    };

    {
        let db = Database::open(path_str).await.unwrap();
        db.set_rules("https://example.com/news", &rules).await.unwrap();
    }

    let db = Database::open(path_str).await.unwrap();
    assert_eq!(db.get_rules("https://example.com/news").await.unwrap(), Some(rules));
    assert_eq!(db.list_rules().await.unwrap().len(), 1);

    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}

#[tokio::test]
async fn test_stored_rules_drive_rule_engine() {
    let db = Database::open(":memory:").await.unwrap();
    db.set_rules(
        "https://example.com/",
        &SourceRules {
            require_description: true,
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let stored = db.get_rules("https://example.com/").await.unwrap().unwrap();
    let articles = vec![
        sitefeed::feed::Article {
            title: "With summary".into(),
            url: "https://example.com/a".into(),
            description: Some("Text".into()),
            published_at: None,
            author: None,
        },
        sitefeed::feed::Article {
            title: "Without summary".into(),
            url: "https://example.com/b".into(),
            description: None,
            published_at: None,
            author: None,
        },
    ];

    let outcome = apply_rules(articles, &stored);
    assert_eq!(outcome.articles.len(), 1);
    assert_eq!(outcome.rule_filtered_count, 1);
}

#[tokio::test]
async fn test_clearing_rules_via_defaults() {
    let db = Database::open(":memory:").await.unwrap();
    let stored = db
        .set_rules(
            "https://example.com/",
            &SourceRules {
                url_excludes: vec!["   ".into()],
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(!stored.is_active());
    assert!(db.list_rules().await.unwrap().is_empty());
}
