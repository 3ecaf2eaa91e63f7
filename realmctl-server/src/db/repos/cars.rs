//! Car repository
//!
//! - create: plain INSERT, the primary key rejects duplicates
//! - delete: a single DELETE, zero affected rows means not found

use chrono::Utc;
use sqlx::SqlitePool;

use super::DbError;
use crate::models::{Car, NewCar, Paginated, Pagination};

/// Car repository over one realm's store
pub struct CarRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> CarRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a car. An existing id yields `AlreadyExists`; POST never
    /// overwrites.
    pub async fn create(&self, car: NewCar) -> Result<Car, DbError> {
        let result = sqlx::query_as::<_, Car>(
            r#"
            INSERT INTO cars (id, name, created_at)
            VALUES (?, ?, ?)
            RETURNING id, name, created_at
            "#,
        )
        .bind(car.id.as_str())
        .bind(car.name.as_str())
        .bind(Utc::now())
        .fetch_one(self.pool)
        .await;

        match result {
            Ok(car) => Ok(car),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(DbError::AlreadyExists {
                    resource: "car",
                    id: car.id.as_str().to_owned(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get(&self, id: &str) -> Result<Car, DbError> {
        sqlx::query_as::<_, Car>("SELECT id, name, created_at FROM cars WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::NotFound {
                resource: "car",
                id: id.to_owned(),
            })
    }

    pub async fn delete(&self, id: &str) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM cars WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound {
                resource: "car",
                id: id.to_owned(),
            });
        }
        Ok(())
    }

    /// Cars in creation order
    pub async fn list(&self, page: Pagination) -> Result<Paginated<Car>, DbError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cars")
            .fetch_one(self.pool)
            .await?;

        let items = sqlx::query_as::<_, Car>(
            r#"
            SELECT id, name, created_at
            FROM cars
            ORDER BY created_at ASC, id ASC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        Ok(Paginated {
            items,
            total,
            page: page.page,
            per_page: page.per_page,
        })
    }
}
