use dynaloop_core::record::Record;

/// Messages that actors send to [`AsyncTrainer`](crate::AsyncTrainer).
#[derive(Debug, Clone)]
pub enum ActorMessage {
    /// A transition was added to the replay buffer.
    Step {
        /// Id of the actor.
        worker: usize,
        /// The step counted as real interaction.
        real: bool,
    },

    /// An episode was committed.
    Episode {
        /// Id of the actor.
        worker: usize,
        /// `length`, `score`, `sum_abs_reward`, `reward_rate`, `real_length`.
        summary: Record,
        /// `sum_<key>`, `mean_<key>`, `max_<key>` of selected fields.
        stats: Record,
    },

    /// The environment failed and was rebuilt.
    Restart {
        /// Id of the actor.
        worker: usize,
        /// Error reported by the environment.
        reason: String,
    },

    /// The actor stopped with an error, e.g. after too many restarts.
    Failed {
        /// Id of the actor.
        worker: usize,
        /// Error that stopped the actor.
        reason: String,
    },
}
