#![no_main]

use keylens_core::{INVISIBLE_CHARACTERS, InvisibleWrapper, KeyDescriptor};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // First byte picks the mode, the rest is a small alphabet heavy on the
    // two marker characters so marker-shaped runs are common.
    let Some((&mode, payload)) = data.split_first() else {
        return;
    };
    let text: String = payload
        .iter()
        .map(|b| match b % 8 {
            0..=2 => INVISIBLE_CHARACTERS[0],
            3..=5 => INVISIBLE_CHARACTERS[1],
            6 => 'a',
            _ => char::from(b' ' + (b % 64)),
        })
        .collect();

    let mut wrapper = InvisibleWrapper::new(mode & 1 == 1);
    // Give opaque mode some table entries to point at.
    let _ = wrapper.wrap_keys("seed", &[KeyDescriptor::new("seed")]);

    if let Some(unwrapped) = wrapper.unwrap(&text) {
        assert!(
            !InvisibleWrapper::has_marker(&unwrapped.text),
            "decoded text still carries a marker"
        );
        assert!(unwrapped.text.chars().count() <= text.chars().count());
    }

    // Arbitrary UTF-8 must never panic either.
    if let Ok(raw) = std::str::from_utf8(payload) {
        let _ = wrapper.unwrap(raw);
    }
});
