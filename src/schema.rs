diesel::table! {
    prices (id) {
        id -> BigInt,
        name -> Text,
        category -> Text,
        price_cents -> BigInt,
        create_date -> Timestamp,
    }
}
