#![no_main]

use catalog_lens_lsp::parsers::scan_catalog_references;
use catalog_lens_lsp::utils::utf16_len;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(content) = std::str::from_utf8(data) {
        let references = scan_catalog_references(content);
        let lines: Vec<&str> = content.split('\n').collect();

        for reference in &references {
            assert!(
                (reference.line as usize) < lines.len(),
                "reference.line out of range"
            );

            let line_len = utf16_len(lines[reference.line as usize]);

            assert!(
                reference.name_start <= reference.name_end,
                "name_start must be <= name_end"
            );
            assert!(
                reference.value_start <= reference.value_end,
                "value_start must be <= value_end"
            );
            assert!(
                reference.value_end <= line_len,
                "value_end must be within line bounds"
            );
        }
    }
});
