//! CLI command implementations.
//!
//! | Module    | Commands handled |
//! |-----------|------------------|
//! | `serve`   | `Serve`          |
//! | `run`     | `Run`            |
//! | `results` | `Results`        |
//! | `config`  | `Config`         |

pub mod config;
pub mod results;
pub mod run;
pub mod serve;

pub use config::cmd_config;
pub use results::cmd_results;
pub use run::cmd_run;
pub use serve::cmd_serve;
