/// Notifications published by the [`Loader`](super::Loader).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoaderEvent {
    /// Counters of the current run
    Progress { queued: usize, completed: usize },
    /// A source finished, successfully or not
    SourceUpdated { source_id: String, ok: bool },
    /// The schedule of a source should be recomputed
    ResetSchedule { source_id: String },
    /// The run stopped, drained or aborted
    Finished { has_new: bool, play_sound: bool },
}

/// Snapshot of the run counters. Both grow monotonically during a run and
/// return to zero when it stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    pub queued: usize,
    pub completed: usize,
}

impl From<Progress> for LoaderEvent {
    fn from(progress: Progress) -> Self {
        LoaderEvent::Progress {
            queued: progress.queued,
            completed: progress.completed,
        }
    }
}
