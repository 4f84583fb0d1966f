pub mod error;
pub mod executor;
pub mod expression;
pub mod plan;
pub mod query;
pub mod schema;
pub mod segment;
pub mod value;
pub mod wire;

pub use error::{PlanError, PlanResult};
pub use plan::{parse_plan, Plan};
