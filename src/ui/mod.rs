pub mod icons;
pub mod progress;
pub mod report;

pub use progress::RunProgressUI;
pub use report::{print_catalog, print_results, score_style};
