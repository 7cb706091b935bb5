//! In-process store implementing every repository trait.
//!
//! All four repositories share one lock, so each operation sees and leaves a
//! consistent state: the active-borrow check and the insert happen together,
//! and cascades (author -> books -> borrow records) are applied atomically.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    authors::AuthorRepository,
    books::{author_reference_error, BookRepository},
    borrow_records::{BorrowRecordRepository, ALREADY_BORROWED},
    users::{duplicate_email, UserRepository},
};
use crate::{
    error::{AppError, AppResult},
    models::{
        author::{Author, AuthorChanges, AuthorWithBooks, NewAuthor},
        book::{Book, BookChanges, BookDetails, BookListEntry, BookQuery, BookWithAuthor, NewBook},
        borrow_record::{BorrowRecord, BorrowRecordDetails, BorrowRecordWithBook, BorrowRecordWithUser},
        user::{NewUser, User, UserCredentials, UserSummary},
    },
};

#[derive(Default)]
struct State {
    users: Vec<UserCredentials>,
    authors: Vec<Author>,
    books: Vec<Book>,
    records: Vec<BorrowRecord>,
}

impl State {
    fn author(&self, id: Uuid) -> Option<&Author> {
        self.authors.iter().find(|a| a.id == id)
    }

    fn book(&self, id: Uuid) -> Option<&Book> {
        self.books.iter().find(|b| b.id == id)
    }

    fn user(&self, id: Uuid) -> Option<&User> {
        self.users.iter().map(|u| &u.user).find(|u| u.id == id)
    }

    fn author_with_books(&self, author: &Author) -> AuthorWithBooks {
        AuthorWithBooks {
            author: author.clone(),
            books: self
                .books
                .iter()
                .filter(|b| b.author_id == author.id)
                .cloned()
                .collect(),
        }
    }

    fn book_with_author(&self, book: &Book) -> AppResult<BookWithAuthor> {
        let author = self
            .author(book.author_id)
            .cloned()
            .ok_or_else(|| AppError::Internal(format!("Book {} has no author", book.id)))?;
        Ok(BookWithAuthor {
            book: book.clone(),
            author,
        })
    }

    fn with_user(&self, record: &BorrowRecord) -> AppResult<BorrowRecordWithUser> {
        let user = self
            .user(record.user_id)
            .map(UserSummary::from)
            .ok_or_else(|| AppError::Internal(format!("Borrow record {} has no user", record.id)))?;
        Ok(BorrowRecordWithUser {
            record: record.clone(),
            user,
        })
    }

    fn details(&self, record: &BorrowRecord) -> AppResult<BorrowRecordDetails> {
        let book = self
            .book(record.book_id)
            .ok_or_else(|| AppError::Internal(format!("Borrow record {} has no book", record.id)))?;
        let with_user = self.with_user(record)?;
        Ok(BorrowRecordDetails {
            record: with_user.record,
            book: self.book_with_author(book)?,
            user: with_user.user,
        })
    }

    fn has_active_borrow(&self, book_id: Uuid) -> bool {
        self.records.iter().any(|r| r.book_id == book_id && r.is_active())
    }

    /// Records of one book, newest borrow first
    fn history(&self, book_id: Uuid, active_only: bool) -> AppResult<Vec<BorrowRecordWithUser>> {
        let mut records: Vec<&BorrowRecord> = self
            .records
            .iter()
            .rev()
            .filter(|r| r.book_id == book_id && (!active_only || r.is_active()))
            .collect();
        records.sort_by(|a, b| b.borrowed_at.cmp(&a.borrowed_at));
        records.into_iter().map(|r| self.with_user(r)).collect()
    }

    /// Records matching `keep`, newest borrow first
    fn newest_records(&self, keep: impl Fn(&BorrowRecord) -> bool) -> Vec<&BorrowRecord> {
        let mut records: Vec<&BorrowRecord> = self.records.iter().rev().filter(|r| keep(r)).collect();
        records.sort_by(|a, b| b.borrowed_at.cmp(&a.borrowed_at));
        records
    }
}

/// Shared in-process store; clones share the same state
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

#[async_trait]
impl AuthorRepository for MemoryStore {
    async fn create(&self, author: &NewAuthor) -> AppResult<Author> {
        let mut state = self.state.lock().await;
        let now = now();
        let author = Author {
            id: Uuid::new_v4(),
            name: author.name.clone(),
            bio: author.bio.clone(),
            birth_date: author.birth_date,
            created_at: now,
            updated_at: now,
        };
        state.authors.push(author.clone());
        Ok(author)
    }

    async fn list_with_books(&self) -> AppResult<Vec<AuthorWithBooks>> {
        let state = self.state.lock().await;
        Ok(state.authors.iter().map(|a| state.author_with_books(a)).collect())
    }

    async fn get_with_books(&self, id: Uuid) -> AppResult<Option<AuthorWithBooks>> {
        let state = self.state.lock().await;
        Ok(state.author(id).map(|a| state.author_with_books(a)))
    }

    async fn update(&self, id: Uuid, changes: &AuthorChanges) -> AppResult<Option<Author>> {
        let mut state = self.state.lock().await;
        let Some(author) = state.authors.iter_mut().find(|a| a.id == id) else {
            return Ok(None);
        };
        author.apply(changes, now());
        Ok(Some(author.clone()))
    }

    async fn delete(&self, id: Uuid) -> AppResult<Option<Author>> {
        let mut state = self.state.lock().await;
        let Some(pos) = state.authors.iter().position(|a| a.id == id) else {
            return Ok(None);
        };
        let author = state.authors.remove(pos);

        let orphaned: Vec<Uuid> = state
            .books
            .iter()
            .filter(|b| b.author_id == id)
            .map(|b| b.id)
            .collect();
        state.books.retain(|b| b.author_id != id);
        state.records.retain(|r| !orphaned.contains(&r.book_id));

        Ok(Some(author))
    }
}

#[async_trait]
impl BookRepository for MemoryStore {
    async fn create(&self, book: &NewBook) -> AppResult<BookWithAuthor> {
        let mut state = self.state.lock().await;
        if state.author(book.author_id).is_none() {
            return Err(author_reference_error(book.author_id));
        }
        let now = now();
        let book = Book {
            id: Uuid::new_v4(),
            title: book.title.clone(),
            isbn: book.isbn.clone(),
            description: book.description.clone(),
            published_at: book.published_at,
            author_id: book.author_id,
            created_at: now,
            updated_at: now,
        };
        state.books.push(book.clone());
        state.book_with_author(&book)
    }

    async fn list(&self, query: &BookQuery) -> AppResult<Vec<BookListEntry>> {
        let state = self.state.lock().await;

        // Reverse insertion order first so equal timestamps keep newest first
        let mut books: Vec<&Book> = state
            .books
            .iter()
            .rev()
            .filter(|b| query.author_id.map_or(true, |id| b.author_id == id))
            .filter(|b| {
                query
                    .borrowed
                    .map_or(true, |borrowed| state.has_active_borrow(b.id) == borrowed)
            })
            .filter(|b| query.search_term().map_or(true, |term| b.matches_search(term)))
            .collect();
        books.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        books
            .into_iter()
            .map(|book| {
                let BookWithAuthor { book, author } = state.book_with_author(book)?;
                Ok(BookListEntry {
                    borrow_records: state.history(book.id, true)?,
                    book,
                    author,
                })
            })
            .collect()
    }

    async fn get(&self, id: Uuid) -> AppResult<Option<Book>> {
        let state = self.state.lock().await;
        Ok(state.book(id).cloned())
    }

    async fn get_with_author(&self, id: Uuid) -> AppResult<Option<BookWithAuthor>> {
        let state = self.state.lock().await;
        state.book(id).map(|b| state.book_with_author(b)).transpose()
    }

    async fn get_with_borrow_history(&self, id: Uuid) -> AppResult<Option<BookDetails>> {
        let state = self.state.lock().await;
        let Some(book) = state.book(id) else {
            return Ok(None);
        };
        let BookWithAuthor { book, author } = state.book_with_author(book)?;
        Ok(Some(BookDetails {
            borrow_records: state.history(id, false)?,
            book,
            author,
        }))
    }

    async fn update(&self, id: Uuid, changes: &BookChanges) -> AppResult<Option<BookWithAuthor>> {
        let mut state = self.state.lock().await;
        if let Some(author_id) = changes.author_id {
            if state.author(author_id).is_none() {
                return Err(author_reference_error(author_id));
            }
        }
        let Some(book) = state.books.iter_mut().find(|b| b.id == id) else {
            return Ok(None);
        };
        book.apply(changes, now());
        let book = book.clone();
        state.book_with_author(&book).map(Some)
    }

    async fn delete(&self, id: Uuid) -> AppResult<Option<Book>> {
        let mut state = self.state.lock().await;
        let Some(pos) = state.books.iter().position(|b| b.id == id) else {
            return Ok(None);
        };
        let book = state.books.remove(pos);
        state.records.retain(|r| r.book_id != id);
        Ok(Some(book))
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create(&self, user: &NewUser) -> AppResult<User> {
        let mut state = self.state.lock().await;
        if state.users.iter().any(|u| u.user.email == user.email) {
            return Err(duplicate_email());
        }
        let now = now();
        let created = User {
            id: Uuid::new_v4(),
            email: user.email.clone(),
            name: user.name.clone(),
            created_at: now,
            updated_at: now,
        };
        state.users.push(UserCredentials {
            user: created.clone(),
            password: user.password.clone(),
        });
        Ok(created)
    }

    async fn list(&self) -> AppResult<Vec<User>> {
        let state = self.state.lock().await;
        Ok(state.users.iter().map(|u| u.user.clone()).collect())
    }

    async fn get(&self, id: Uuid) -> AppResult<Option<User>> {
        let state = self.state.lock().await;
        Ok(state.user(id).cloned())
    }

    async fn email_exists(&self, email: &str) -> AppResult<bool> {
        let state = self.state.lock().await;
        Ok(state.users.iter().any(|u| u.user.email == email))
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<UserCredentials>> {
        let state = self.state.lock().await;
        Ok(state.users.iter().find(|u| u.user.email == email).cloned())
    }
}

#[async_trait]
impl BorrowRecordRepository for MemoryStore {
    async fn get(&self, id: Uuid) -> AppResult<Option<BorrowRecord>> {
        let state = self.state.lock().await;
        Ok(state.records.iter().find(|r| r.id == id).cloned())
    }

    async fn find_active_for_book(&self, book_id: Uuid) -> AppResult<Option<BorrowRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .records
            .iter()
            .find(|r| r.book_id == book_id && r.is_active())
            .cloned())
    }

    async fn create(&self, record: &BorrowRecord) -> AppResult<BorrowRecordDetails> {
        let mut state = self.state.lock().await;
        if state.book(record.book_id).is_none() || state.user(record.user_id).is_none() {
            return Err(AppError::NotFound("Book or user not found".to_string()));
        }
        if state.has_active_borrow(record.book_id) {
            return Err(AppError::BusinessRule(ALREADY_BORROWED.to_string()));
        }
        state.records.push(record.clone());
        state.details(record)
    }

    async fn mark_returned(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<Option<BorrowRecordDetails>> {
        let mut state = self.state.lock().await;
        let Some(record) = state.records.iter_mut().find(|r| r.id == id) else {
            return Ok(None);
        };
        if !record.close(at) {
            return Ok(None);
        }
        let record = record.clone();
        state.details(&record).map(Some)
    }

    async fn list_by_user(&self, user_id: Uuid) -> AppResult<Vec<BorrowRecordWithBook>> {
        let state = self.state.lock().await;
        state
            .newest_records(|r| r.user_id == user_id)
            .into_iter()
            .map(|r| {
                let book = state
                    .book(r.book_id)
                    .ok_or_else(|| AppError::Internal(format!("Borrow record {} has no book", r.id)))?;
                Ok(BorrowRecordWithBook {
                    record: r.clone(),
                    book: state.book_with_author(book)?,
                })
            })
            .collect()
    }

    async fn list_all(&self) -> AppResult<Vec<BorrowRecordDetails>> {
        let state = self.state.lock().await;
        state
            .newest_records(|_| true)
            .into_iter()
            .map(|r| state.details(r))
            .collect()
    }
}
