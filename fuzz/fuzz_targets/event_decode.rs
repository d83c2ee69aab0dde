#![no_main]

use libfuzzer_sys::fuzz_target;

use herald_core::EventCatalog;

fuzz_target!(|data: &[u8]| {
    let catalog = EventCatalog::standard();
    let Some((&selector, payload)) = data.split_first() else {
        return;
    };
    let mut tags: Vec<_> = catalog.tags().collect();
    tags.sort();
    let tag = tags[usize::from(selector) % tags.len()];

    // Malformed payloads must come back as errors, never panics
    if let Ok(event) = catalog.decode(tag.as_str(), payload) {
        assert_eq!(event.tag(), tag);
    }
});
