pub mod batch;
pub mod categories;
pub mod migrator;
pub mod normalize;
pub mod repair;
pub mod report;

pub use batch::{run_audit, run_migrate, run_normalize, BackupPlan, BatchError, BatchOptions};
pub use report::MigrationReport;
