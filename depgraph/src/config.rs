//! The one runtime-wide knob the dependency engine itself owns; everything
//! else (worker count, CPU mask, scheduler policy) belongs to the
//! out-of-scope collaborators in [`crate::collab`].

/// Configuration for [`crate::engine`]'s entry points.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Whether [`crate::linking::link_task_accesses`] takes out an extra,
    /// temporary predecessor-count guard while it walks a task's accesses.
    ///
    /// Spec §9's open question notes the original bumps
    /// `predecessor_count` by a fixed amount before linking and drops it by
    /// the same amount afterward, purely so that `predecessor_count` can
    /// never transiently read zero while linking is still in progress and
    /// propagation from an unrelated producer is racing it. In this crate,
    /// linking holds the task's own access lock for its entire duration and
    /// every path that mutates `predecessor_count` for that task requires
    /// the same lock, so the race the guard defends against cannot occur by
    /// construction — the guard is redundant here, not load-bearing. It
    /// defaults to `true` to preserve the original's defensive posture
    /// (and to keep the knob meaningful for an embedder who changes the
    /// locking scheme in a way that no longer makes the proof hold).
    pub guard_predecessor_count: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            guard_predecessor_count: true,
        }
    }
}
