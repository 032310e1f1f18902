use proptest::prelude::*;

/// Strategy for generating valid queue names
pub fn queue_name_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_-]{1,64}"
}

/// Strategy for generating non-empty record batches
pub fn records_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-z0-9]{0,12}", 1..16)
}

/// Strategy for generating a producer's stream of batches
pub fn batch_stream_strategy() -> impl Strategy<Value = Vec<Vec<i64>>> {
    prop::collection::vec(prop::collection::vec(any::<i64>(), 1..8), 0..32)
}
