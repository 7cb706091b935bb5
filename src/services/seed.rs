//! Demo data for local runs

use super::Services;
use crate::{
    error::AppResult,
    models::{author::CreateAuthor, book::CreateBook, borrow_record::BorrowBook, user::CreateUser},
};

const DEMO_PASSWORD: &str = "password123";

/// Load demo users, authors, books and one active borrow. Does nothing when
/// any author already exists. Returns whether data was inserted.
pub async fn seed(services: &Services) -> AppResult<bool> {
    if !services.authors.list().await?.is_empty() {
        tracing::info!("Seed skipped: catalog is not empty");
        return Ok(false);
    }

    let mut users = Vec::new();
    for (email, name) in [("john@example.com", "John Doe"), ("jane@example.com", "Jane Smith")] {
        let user = services
            .users
            .create(CreateUser {
                email: email.to_string(),
                name: name.to_string(),
                password: DEMO_PASSWORD.to_string(),
            })
            .await?;
        users.push(user);
    }

    let mut authors = Vec::new();
    for (name, bio, birth_date) in [
        (
            "J.K. Rowling",
            "British author, best known for the Harry Potter series",
            "1965-07-31",
        ),
        (
            "George R.R. Martin",
            "American novelist and short story writer",
            "1948-09-20",
        ),
        (
            "Agatha Christie",
            "English writer known for her detective novels",
            "1890-09-15",
        ),
    ] {
        let author = services
            .authors
            .create(CreateAuthor {
                name: name.to_string(),
                bio: Some(bio.to_string()),
                birth_date: Some(birth_date.to_string()),
            })
            .await?;
        authors.push(author);
    }

    let mut books = Vec::new();
    for (title, isbn, description, published_at, author) in [
        (
            "Harry Potter and the Philosopher's Stone",
            "978-0747532699",
            "The first novel in the Harry Potter series",
            "1997-06-26",
            &authors[0],
        ),
        (
            "Harry Potter and the Chamber of Secrets",
            "978-0747538493",
            "The second novel in the Harry Potter series",
            "1998-07-02",
            &authors[0],
        ),
        (
            "A Game of Thrones",
            "978-0553103540",
            "The first novel in A Song of Ice and Fire",
            "1996-08-01",
            &authors[1],
        ),
        (
            "Murder on the Orient Express",
            "978-0062693662",
            "A detective novel featuring Hercule Poirot",
            "1934-01-01",
            &authors[2],
        ),
    ] {
        let book = services
            .catalog
            .create(CreateBook {
                title: title.to_string(),
                isbn: Some(isbn.to_string()),
                description: Some(description.to_string()),
                published_at: Some(published_at.to_string()),
                author_id: author.id.to_string(),
            })
            .await?;
        books.push(book);
    }

    services
        .borrowing
        .borrow(BorrowBook {
            book_id: books[0].book.id.to_string(),
            user_id: users[0].id.to_string(),
        })
        .await?;

    tracing::info!(
        "Seeded {} users, {} authors, {} books and 1 borrow",
        users.len(),
        authors.len(),
        books.len()
    );
    Ok(true)
}
