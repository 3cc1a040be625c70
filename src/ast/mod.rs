//! Expression tree, literals and table metadata.

pub mod expr;
pub mod json_path;
pub mod operators;
pub mod schema;
pub mod values;
pub mod window;

pub use expr::{Expr, col, lit};
pub use json_path::{JsonPath, PathSegment};
pub use operators::{BinaryOp, LogicalOp, Operator, SortOrder};
pub use schema::{ColumnArg, ColumnDef, ColumnType, TableSchema};
pub use values::Value;
pub use window::{Boundary, ExcludeOption, FrameSpec, FrameUnit, WindowClause};
