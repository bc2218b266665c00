//! Import subsystems for osmplace.
//!
//! Three tightly coupled pieces make up the importer core: the disk-backed
//! [`flatnode`] coordinate cache, the rule-driven [`style`] tag
//! classification engine, and the [`geometry`] assembler producing
//! SRID-prefixed WKB. The [`output`] module serialises classified rows in
//! PostgreSQL COPY text form and [`pipeline`] wires everything together.

pub mod flatnode;
pub mod geometry;
pub mod output;
pub mod pipeline;
pub mod style;
