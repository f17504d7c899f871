pub mod check;
pub mod run;

pub use check::check_path;
pub use run::{print_tree, run_scenario};
