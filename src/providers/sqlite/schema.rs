diesel::table! {
    users (id) {
        id -> BigInt,
        first_name -> Text,
        last_name -> Text,
        username -> Text,
        created_at -> BigInt,
        updated_at -> BigInt,
    }
}

diesel::table! {
    chat_groups (id) {
        id -> BigInt,
        title -> Text,
        timezone -> Text,
        created_at -> BigInt,
        updated_at -> BigInt,
    }
}

diesel::table! {
    owned (id) {
        id -> Integer,
        user_id -> BigInt,
        group_id -> BigInt,
        week -> BigInt,
        units -> Integer,
        bells -> Integer,
        updated_at -> BigInt,
    }
}

diesel::table! {
    prices (id) {
        id -> Integer,
        user_id -> BigInt,
        group_id -> BigInt,
        half_day -> BigInt,
        bells -> Integer,
        updated_at -> BigInt,
    }
}
