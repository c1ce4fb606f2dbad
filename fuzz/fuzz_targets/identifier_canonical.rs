#![no_main]

use ferrous_inject::{canonicalize, Identifier};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = std::str::from_utf8(data) else {
        return;
    };

    let once = canonicalize(raw);
    assert_eq!(canonicalize(&once), once);
    assert_eq!(Identifier::named(raw), Identifier::named(&once));
    assert!(!once.starts_with(char::is_whitespace));
    assert!(!once.ends_with(char::is_whitespace));
});
