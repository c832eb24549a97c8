//! Diesel schema for coordinator persistence.

diesel::table! {
    /// Registered builders with their liveness and assignment state.
    builders (id) {
        /// Builder identifier.
        id -> Uuid,
        /// Unique display name.
        #[max_length = 100]
        name -> Varchar,
        /// Hex SHA-256 digest of the builder token.
        #[max_length = 64]
        token_digest -> Varchar,
        /// Trust level.
        #[max_length = 20]
        trust_level -> Varchar,
        /// Idle flag from the latest heartbeat or release.
        is_idle -> Bool,
        /// Latest heartbeat time.
        last_heartbeat_at -> Nullable<Timestamptz>,
        /// Task the builder holds.
        assigned_task_id -> Nullable<Uuid>,
        /// Whether the held task was handed over.
        assignment_delivered -> Bool,
        /// Registration timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// One row per declared platform and tag set.
    builder_capabilities (id) {
        /// Surrogate key.
        id -> Int8,
        /// Owning builder.
        builder_id -> Uuid,
        /// Operating system.
        #[max_length = 64]
        os -> Varchar,
        /// Architecture.
        #[max_length = 64]
        arch -> Varchar,
        /// Sorted tag array.
        tags -> Jsonb,
    }
}

diesel::table! {
    /// Build tasks.
    tasks (id) {
        /// Task identifier.
        id -> Uuid,
        /// Target operating system.
        #[max_length = 64]
        os -> Varchar,
        /// Target architecture.
        #[max_length = 64]
        arch -> Varchar,
        /// Sorted required tag array.
        tags -> Jsonb,
        /// Resolved commit hash.
        #[max_length = 64]
        commit_id -> Varchar,
        /// Lifecycle status.
        #[max_length = 20]
        status -> Varchar,
        /// Poster identity.
        poster_id -> Uuid,
        /// Builder currently holding the task.
        assigned_builder_id -> Nullable<Uuid>,
        /// Most recent builder to hold the task.
        last_builder_id -> Nullable<Uuid>,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::joinable!(builder_capabilities -> builders (builder_id));
diesel::allow_tables_to_appear_in_same_query!(builders, builder_capabilities, tasks);
