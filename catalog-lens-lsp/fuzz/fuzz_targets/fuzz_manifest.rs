#![no_main]

use catalog_lens_lsp::workspace::{ManifestFormat, parse_manifest, recover_positions};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(content) = std::str::from_utf8(data) {
        let line_count = content.split('\n').count() as u32;

        for format in [ManifestFormat::Yaml, ManifestFormat::Json] {
            parse_manifest(content, format);
            let positions = recover_positions(content, format);

            for (_, _, span) in positions.entries() {
                assert!(span.start_line >= 1, "lines must be 1-based");
                assert!(
                    span.start_line <= span.end_line,
                    "span must not end before it starts"
                );
                assert!(
                    span.end_line <= line_count,
                    "span must stay within the text"
                );
            }
        }
    }
});
