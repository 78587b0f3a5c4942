//! Query modules, one per table family. Free functions over a borrowed
//! connection; transactions are owned by the calling operation.

pub mod cliff_ops;
pub mod family_ops;
pub mod health;
pub mod lineage_ops;
pub mod priority_ops;
pub mod record_ops;
