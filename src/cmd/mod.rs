//! CLI command implementations.
//!
//! | Module    | Commands handled    |
//! |-----------|---------------------|
//! | `project` | `Init`              |
//! | `run`     | `Run`               |
//! | `status`  | `Status`, `Reset`   |

pub mod project;
pub mod run;
pub mod status;

pub use project::cmd_init;
pub use run::{RunOverrides, cmd_run};
pub use status::{cmd_reset, cmd_status};
