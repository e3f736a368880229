diesel::table! {
    users (id) {
        id -> Uuid,
        name -> Varchar,
        email -> Varchar,
        password_hash -> Text,
        role -> Int2,
        tier -> Nullable<Int2>,
        status -> Int2,
        phone -> Nullable<Varchar>,
        performance_score -> Float8,
        leads_handled -> Int4,
        conversion_rate -> Float8,
        avg_deal_size -> Float8,
        referrals -> Int4,
        available_start -> Varchar,
        available_end -> Varchar,
        timezone -> Varchar,
        notify_new_lead_assignments -> Bool,
        notify_lead_responses -> Bool,
        notify_performance_reports -> Bool,
        notify_training_updates -> Bool,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    leads (id) {
        id -> Uuid,
        name -> Varchar,
        email -> Varchar,
        phone -> Nullable<Varchar>,
        tier -> Int2,
        score -> Float8,
        status -> Int2,
        stage -> Int2,
        assigned_warmer -> Nullable<Uuid>,
        assigned_closer -> Nullable<Uuid>,
        intent -> Varchar,
        response_speed -> Varchar,
        last_contacted_at -> Nullable<Timestamptz>,
        estimated_value -> Nullable<Float8>,
        probability -> Nullable<Varchar>,
        scheduled_call_time -> Nullable<Timestamptz>,
        source -> Varchar,
        closed_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    lead_notes (id) {
        id -> Uuid,
        lead_id -> Uuid,
        author_id -> Nullable<Uuid>,
        text -> Text,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    lead_messages (id) {
        id -> Uuid,
        lead_id -> Uuid,
        sender -> Int2,
        text -> Text,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    activities (id) {
        id -> Uuid,
        activity_type -> Int2,
        user_id -> Nullable<Uuid>,
        target -> Varchar,
        details -> Text,
        related_lead -> Nullable<Uuid>,
        metadata -> Jsonb,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    tasks (id) {
        id -> Uuid,
        title -> Varchar,
        description -> Text,
        priority -> Int2,
        status -> Int2,
        assignee -> Uuid,
        due_date -> Varchar,
        related_lead -> Nullable<Uuid>,
        created_by -> Nullable<Uuid>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::joinable!(lead_notes -> leads (lead_id));
diesel::joinable!(lead_messages -> leads (lead_id));
diesel::joinable!(activities -> leads (related_lead));

diesel::allow_tables_to_appear_in_same_query!(
    users,
    leads,
    lead_notes,
    lead_messages,
    activities,
    tasks,
);
