// tests/property_normalization.rs

use std::path::PathBuf;

use proptest::prelude::*;

use bundlewatch::compiler::{cleanse_error, compilation_message};
use bundlewatch::config::resolve_output_path;

fn segment() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_-]{0,8}"
}

fn frame() -> impl Strategy<Value = String> {
    ("[ \t]{1,6}", "[a-zA-Z0-9_./:() ]{0,20}").prop_map(|(indent, rest)| format!("\n{indent}at {rest}"))
}

proptest! {
    #[test]
    fn resolved_output_always_ends_in_js(
        dirs in proptest::collection::vec(segment(), 0..4),
        stem in segment(),
        ext in prop::option::of("[a-zA-Z]{1,4}"),
    ) {
        let mut requested = PathBuf::from("/");
        for dir in &dirs {
            requested.push(dir);
        }
        let name = match &ext {
            Some(ext) => format!("{stem}.{ext}"),
            None => stem.clone(),
        };
        requested.push(&name);

        let resolved = resolve_output_path(&requested);

        prop_assert_eq!(resolved.extension().and_then(|e| e.to_str()), Some("js"));
        prop_assert_eq!(resolved.parent(), requested.parent());
        if ext.as_deref() == Some("js") {
            prop_assert_eq!(&resolved, &requested);
        } else {
            prop_assert_eq!(resolved.to_string_lossy(), format!("{}.js", requested.to_string_lossy()));
        }

        // Normalizing twice changes nothing.
        prop_assert_eq!(resolve_output_path(&resolved), resolved);
    }

    #[test]
    fn stack_frames_never_survive(
        headline in "[A-Z][a-zA-Z ]{0,30}",
        frames in proptest::collection::vec(frame(), 0..5),
    ) {
        let message = format!("{headline}{}", frames.concat());
        let cleansed = cleanse_error(&message);

        prop_assert_eq!(&cleansed, &headline);
        prop_assert!(!cleansed.contains("\n "));
    }

    #[test]
    fn joined_message_keeps_one_block_per_error(
        headlines in proptest::collection::vec("[A-Z][a-zA-Z]{0,12}", 1..6),
    ) {
        let errors: Vec<String> = headlines
            .iter()
            .map(|h| format!("{h}\n    at bundle.js:1:1"))
            .collect();

        let message = compilation_message(&errors);

        prop_assert_eq!(message.split("\n\n").count(), headlines.len());
        prop_assert_eq!(message, headlines.join("\n\n"));
    }
}
