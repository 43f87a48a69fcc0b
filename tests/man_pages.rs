//! Checks the manual pages rendered by the build script.

use rstest::rstest;

const OUT_DIR: &str = env!("OUT_DIR");

fn read_page(name: &str) -> String {
    let path = format!("{OUT_DIR}/{name}.1");
    std::fs::read_to_string(&path).unwrap_or_else(|err| panic!("read {path}: {err}"))
}

#[rstest]
#[case("cllama", "run")]
#[case("cllama-run", "force\\-rebuild")]
#[case("cllama-list", "List available models")]
#[case("cllama-serve", "Serve models locally")]
fn build_renders_a_page_per_command(#[case] page: &str, #[case] expected: &str) {
    let rendered = read_page(page);
    assert!(rendered.contains(".TH"), "{page} is not a man page");
    assert!(rendered.contains(expected), "{page} lacks {expected:?}");
}
