//! Parameter resolution: raw tables in, one immutable [`ParameterSet`] out.

pub mod prices;
pub mod resolver;
pub mod tables;

pub use prices::{price_row_for, route_unit_cost, PriceTable};
pub use resolver::{resolve, DemandSchedule, ParameterSet, ResolveOptions, AGGREGATE_CLASS};
pub use tables::{CsvDirectory, InMemoryTables, Table, TableSource};
