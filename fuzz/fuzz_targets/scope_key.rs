#![no_main]

use ferrous_inject::ScopeKey;
use libfuzzer_sys::fuzz_target;

// Splits the input into (name, id) pairs on NUL bytes
fn pairs(data: &str) -> Vec<(String, String)> {
    let fields: Vec<&str> = data.split('\0').collect();
    fields
        .chunks(2)
        .map(|chunk| (chunk[0].to_string(), chunk.get(1).copied().unwrap_or("").to_string()))
        .collect()
}

fuzz_target!(|data: (&str, &str)| {
    let (left, right) = data;
    let a = pairs(left);
    let b = pairs(right);

    let key_a = ScopeKey::compose(a.clone());
    let key_b = ScopeKey::compose(b.clone());

    // Equal encodings only for equal component lists
    assert_eq!(key_a == key_b, a == b);
    assert_eq!(key_a.parts(), a.as_slice());
    for (name, id) in &a {
        assert!(key_a.contains(name, id));
    }
});
