//! Esquema Diesel (mantenido a mano). Reemplazable con `diesel print-schema`.

diesel::table! {
    users (id) {
        id -> BigInt,
        department_id -> BigInt,
    }
}

diesel::table! {
    workflow_steps (id) {
        id -> BigInt,
        department_id -> BigInt,
        step_order -> Integer,
        approver_id -> BigInt,
        status -> Text,
    }
}

diesel::table! {
    item_details (id) {
        id -> BigInt,
        reference_id -> BigInt,
        item_type -> Text,
        department_id -> BigInt,
        owner_id -> Nullable<BigInt>,
        line_code -> Nullable<Text>,
        lifecycle_status -> Text,
        created_by -> Nullable<BigInt>,
        updated_at -> Nullable<Timestamptz>,
        updated_by -> Nullable<BigInt>,
    }
}

diesel::table! {
    tracking_files (item_detail_id) {
        item_detail_id -> BigInt,
        file_name -> Text,
        file_path -> Text,
        updated_at -> Timestamptz,
        updated_by -> BigInt,
    }
}

diesel::table! {
    approval_records (id) {
        id -> BigInt,
        item_detail_id -> BigInt,
        approver_id -> BigInt,
        level -> Integer,
        status -> Text,
        is_action -> Bool,
        round -> Integer,
        tier -> Text,
        status_flag -> Text,
        note -> Nullable<Text>,
        created_at -> Timestamptz,
        created_by -> BigInt,
        updated_at -> Timestamptz,
        updated_by -> BigInt,
    }
}

diesel::joinable!(approval_records -> item_details (item_detail_id));
diesel::joinable!(tracking_files -> item_details (item_detail_id));

diesel::allow_tables_to_appear_in_same_query!(
    users,
    workflow_steps,
    item_details,
    tracking_files,
    approval_records,
);
