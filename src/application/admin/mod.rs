//! Application services for the administrative surface.

pub mod categories;
pub mod dashboard;
pub mod posts;

pub use categories::{AdminCategoryError, AdminCategoryService};
pub use dashboard::{AdminDashboardError, AdminDashboardService};
pub use posts::{AdminPostError, AdminPostService};
