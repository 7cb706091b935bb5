//! Postgres repository tests
//!
//! Each test gets a fresh database with the migrations applied. They need a
//! running server reachable through `DATABASE_URL`.
//! Run with: cargo test --test postgres_tests -- --ignored

use chrono::Utc;
use sqlx::PgPool;
use tokio::task::JoinSet;
use uuid::Uuid;

use library_server::{
    models::{
        author::{Author, NewAuthor},
        book::{Book, BookQuery, NewBook},
        borrow_record::BorrowRecord,
        user::{NewUser, User},
    },
    repository::Repository,
    AppError,
};

async fn author(repo: &Repository, name: &str) -> Author {
    repo.authors
        .create(&NewAuthor {
            name: name.to_string(),
            bio: None,
            birth_date: None,
        })
        .await
        .unwrap()
}

async fn book(repo: &Repository, title: &str, author_id: Uuid) -> Book {
    repo.books
        .create(&NewBook {
            title: title.to_string(),
            isbn: None,
            description: None,
            published_at: None,
            author_id,
        })
        .await
        .unwrap()
        .book
}

async fn user(repo: &Repository, email: &str) -> User {
    repo.users
        .create(&NewUser {
            email: email.to_string(),
            name: email.to_string(),
            password: "hash".to_string(),
        })
        .await
        .unwrap()
}

fn titles(entries: &[library_server::models::BookListEntry]) -> Vec<&str> {
    entries.iter().map(|e| e.book.title.as_str()).collect()
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_concurrent_borrows_admit_one(pool: PgPool) {
    let repo = Repository::postgres(pool);
    let christie = author(&repo, "Agatha Christie").await;
    let orient = book(&repo, "Murder on the Orient Express", christie.id).await;

    let mut borrowers = Vec::new();
    for i in 0..8 {
        borrowers.push(user(&repo, &format!("member{}@example.com", i)).await);
    }

    let mut tasks = JoinSet::new();
    for borrower in borrowers {
        let repo = repo.clone();
        let book_id = orient.id;
        tasks.spawn(async move {
            repo.borrow_records
                .create(&BorrowRecord::open(book_id, borrower.id, Utc::now()))
                .await
        });
    }

    let mut admitted = 0;
    while let Some(result) = tasks.join_next().await {
        match result.unwrap() {
            Ok(details) => {
                assert_eq!(details.book.book.id, orient.id);
                admitted += 1;
            }
            Err(err) => assert!(matches!(err, AppError::BusinessRule(_)), "{:?}", err),
        }
    }
    assert_eq!(admitted, 1);
    assert_eq!(repo.borrow_records.list_all().await.unwrap().len(), 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_borrowed_filter(pool: PgPool) {
    let repo = Repository::postgres(pool);
    let christie = author(&repo, "Agatha Christie").await;
    let orient = book(&repo, "Murder on the Orient Express", christie.id).await;
    book(&repo, "The Mysterious Affair at Styles", christie.id).await;
    let jane = user(&repo, "jane@example.com").await;

    let record = repo
        .borrow_records
        .create(&BorrowRecord::open(orient.id, jane.id, Utc::now()))
        .await
        .unwrap();

    let borrowed = repo
        .books
        .list(&BookQuery {
            borrowed: Some(true),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(titles(&borrowed), vec!["Murder on the Orient Express"]);
    assert_eq!(borrowed[0].borrow_records.len(), 1);
    assert_eq!(borrowed[0].borrow_records[0].user.id, jane.id);

    let available = repo
        .books
        .list(&BookQuery {
            borrowed: Some(false),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(titles(&available), vec!["The Mysterious Affair at Styles"]);
    assert!(available[0].borrow_records.is_empty());

    repo.borrow_records
        .mark_returned(record.record.id, Utc::now())
        .await
        .unwrap()
        .unwrap();
    let borrowed = repo
        .books
        .list(&BookQuery {
            borrowed: Some(true),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(borrowed.is_empty());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_search_treats_wildcards_literally(pool: PgPool) {
    let repo = Repository::postgres(pool);
    let writer = author(&repo, "Anonymous").await;
    book(&repo, "100%_done", writer.id).await;
    book(&repo, "100 percent done", writer.id).await;

    let found = repo
        .books
        .list(&BookQuery {
            search: Some("%_".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(titles(&found), vec!["100%_done"]);

    let found = repo
        .books
        .list(&BookQuery {
            search: Some("100 PERCENT".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(titles(&found), vec!["100 percent done"]);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_author_delete_cascades(pool: PgPool) {
    let repo = Repository::postgres(pool);
    let christie = author(&repo, "Agatha Christie").await;
    let martin = author(&repo, "George R.R. Martin").await;
    let orient = book(&repo, "Murder on the Orient Express", christie.id).await;
    let thrones = book(&repo, "A Game of Thrones", martin.id).await;
    let jane = user(&repo, "jane@example.com").await;
    repo.borrow_records
        .create(&BorrowRecord::open(orient.id, jane.id, Utc::now()))
        .await
        .unwrap();

    let deleted = repo.authors.delete(christie.id).await.unwrap().unwrap();
    assert_eq!(deleted.id, christie.id);

    assert!(repo.books.get(orient.id).await.unwrap().is_none());
    assert!(repo.books.get(thrones.id).await.unwrap().is_some());
    assert!(repo.borrow_records.list_all().await.unwrap().is_empty());
    assert!(repo.authors.get_with_books(christie.id).await.unwrap().is_none());
    assert!(repo.authors.delete(christie.id).await.unwrap().is_none());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_mark_returned_only_once(pool: PgPool) {
    let repo = Repository::postgres(pool);
    let christie = author(&repo, "Agatha Christie").await;
    let orient = book(&repo, "Murder on the Orient Express", christie.id).await;
    let jane = user(&repo, "jane@example.com").await;
    let record = repo
        .borrow_records
        .create(&BorrowRecord::open(orient.id, jane.id, Utc::now()))
        .await
        .unwrap();

    let returned = repo
        .borrow_records
        .mark_returned(record.record.id, Utc::now())
        .await
        .unwrap()
        .unwrap();
    let first = returned.record.returned_at;
    assert!(first.is_some());

    assert!(repo
        .borrow_records
        .mark_returned(record.record.id, Utc::now())
        .await
        .unwrap()
        .is_none());
    let stored = repo.borrow_records.get(record.record.id).await.unwrap().unwrap();
    assert_eq!(stored.returned_at, first);

    // The book can be borrowed again once returned
    repo.borrow_records
        .create(&BorrowRecord::open(orient.id, jane.id, Utc::now()))
        .await
        .unwrap();
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_duplicate_email_conflicts(pool: PgPool) {
    let repo = Repository::postgres(pool);
    user(&repo, "jane@example.com").await;

    let err = repo
        .users
        .create(&NewUser {
            email: "jane@example.com".to_string(),
            name: "Jane Again".to_string(),
            password: "hash".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)), "{:?}", err);
}
