// CLI command implementations

pub mod matrix;
pub mod run;
