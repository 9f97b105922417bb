mod best_effort_path_ext;

pub use best_effort_path_ext::BestEffortPathExt;
pub(crate) use best_effort_path_ext::normalize_path;
