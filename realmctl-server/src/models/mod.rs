//! Domain models with validation at construction
//!
//! Request input is checked when these types are built; bad input becomes a
//! `ValidationError`, never a panic.

pub mod car;
pub mod pagination;
pub mod validation;

pub use car::{Car, CarId, CarName, CreateCarRequest, NewCar};
pub use pagination::{Paginated, Pagination, PaginationParams};
pub use validation::ValidationError;
