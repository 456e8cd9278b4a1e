pub mod artifacts;
pub mod bootstrap;
pub mod metadata;
pub mod task;

pub(crate) fn default_true() -> bool {
    true
}
