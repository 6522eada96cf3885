//! Property tests over the configuration lexer.

use proptest::prelude::*;
use rstest::rstest;

use retro80_sys::{Lexer, Token};

proptest! {
    /// Any decimal rendering lexes back to the same value.
    #[test]
    fn decimal_numbers_round_trip(value in 0u64..=u64::from(u32::MAX)) {
        let text = value.to_string();
        let mut lexer = Lexer::new(&text);
        lexer.advance(true).expect("decimal digits are lexable");
        prop_assert_eq!(lexer.token(), Token::Number);
        prop_assert_eq!(lexer.value(), value);
    }

    /// Any hex rendering with the 0x prefix lexes back to the same value.
    #[test]
    fn hex_numbers_round_trip(value in 0u64..=u64::from(u32::MAX)) {
        let text = format!("{value:#x}");
        let mut lexer = Lexer::new(&text);
        lexer.advance(true).expect("hex digits are lexable");
        prop_assert_eq!(lexer.token(), Token::Number);
        prop_assert_eq!(lexer.value(), value);
    }

    /// Identifier-shaped input always comes back as one lower-cased Id.
    #[test]
    fn identifiers_fold_and_stay_whole(name in "[A-Za-z][A-Za-z0-9_]{0,15}") {
        let mut lexer = Lexer::new(&name);
        lexer.advance(false).expect("identifier is lexable");
        prop_assert_eq!(lexer.token(), Token::Id);
        prop_assert_eq!(lexer.text(), name.to_ascii_lowercase());
        lexer.advance(false).expect("eof is lexable");
        prop_assert_eq!(lexer.token(), Token::Eof);
    }
}

#[rstest]
#[case("64k", 64 * 1024)]
#[case("0x40k", 0x40 * 1024)]
#[case("1m", 1024 * 1024)]
#[case("2048", 2048)]
#[case("0xf800", 0xF800)]
// Hex with a leading letter digit needs the 0x prefix; a bare "f800h"
// is identifier-shaped, exactly as in the grammar.
#[case("0f800h", 0xF800)]
fn common_config_sizes(#[case] text: &str, #[case] expected: u64) {
    let mut lexer = Lexer::new(text);
    lexer.advance(true).expect("lexable size");
    assert_eq!(lexer.token(), Token::Number);
    assert_eq!(lexer.value(), expected);
}
