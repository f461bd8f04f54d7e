// @generated — hand-maintained to match the migrations in this crate.

diesel::table! {
    listings (vcoin_id) {
        vcoin_id -> Text,
        symbol_name -> Text,
        project_name -> Text,
        announced_launch_time_ms -> Int8,
        announced_launch_utc -> Timestamptz,
        status -> Text,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    targets (id) {
        id -> Int4,
        vcoin_id -> Text,
        contract -> Text,
        price_precision -> Int4,
        qty_precision -> Int4,
        actual_launch_time_ms -> Int8,
        actual_launch_utc -> Timestamptz,
        discovered_at_utc -> Timestamptz,
        hours_advance_notice -> Float8,
        intended_buy_amount_quote -> Float8,
        order_params -> Jsonb,
        execution_status -> Text,
        execution_response -> Nullable<Jsonb>,
        executed_at_utc -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    execution_history (id) {
        id -> Int4,
        vcoin_id -> Text,
        contract -> Text,
        execution_timestamp_utc -> Timestamptz,
        execution_type -> Text,
        buy_amount_quote -> Float8,
        success -> Bool,
        order_id -> Nullable<Text>,
        filled_qty -> Nullable<Float8>,
        avg_price -> Nullable<Float8>,
        total_cost_quote -> Nullable<Float8>,
        duration_ms -> Nullable<Int8>,
        error_kind -> Nullable<Text>,
        error_message -> Nullable<Text>,
    }
}

diesel::joinable!(targets -> listings (vcoin_id));
diesel::allow_tables_to_appear_in_same_query!(listings, targets, execution_history);
