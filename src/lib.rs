// src/lib.rs
pub mod fetch;
pub mod process;
pub mod select;

pub use process::{Cell, Columns, MaterializedTable, RawTable, TableMeta};
pub use select::{
    choices::{factor_choices, Choice},
    get_breakpoint_data, get_international_portfolio, get_portfolio_data, InternationalParams,
};
