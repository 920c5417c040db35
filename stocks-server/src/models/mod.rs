//! Domain models with validation at construction
//!
//! All user input is validated when creating these types.
//! Invalid input returns ValidationError, not panic.

pub mod pagination;
pub mod stock;
pub mod validation;

pub use pagination::{Paginated, Pagination, PaginationParams};
pub use stock::{parse_stock_id, Stock, StockDraft, StockName};
pub use validation::ValidationError;
